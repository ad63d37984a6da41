use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use reservoir::config::{FleetConfig, MonitorConfig, DEFAULT_WORKER_DIR};
use reservoir::fleet::BuildError;
use reservoir::lifecycle::{provision, FleetController};
use reservoir::monitor::TcpProber;
use reservoir::scheduler::LocalEngine;
use reservoir::shutdown::install_shutdown_handler;
use reservoir::source::{DirectorySource, WorkerSpecSource};

#[derive(Parser, Debug)]
#[command(name = "reservoir")]
#[command(version)]
#[command(about = "Control plane for a distributed worker fleet")]
struct Args {
    /// Use directory for worker configuration files
    #[arg(long, default_value = DEFAULT_WORKER_DIR)]
    workers: PathBuf,

    /// Be very verbose
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Milliseconds between two probe cycles
    #[arg(long, default_value = "5000", value_parser = clap::value_parser!(u64).range(1..))]
    probe_interval_ms: u64,

    /// Upper bound for a single liveness probe, in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    probe_timeout_ms: u64,

    /// Maximum number of probes in flight across the fleet
    #[arg(long, default_value = "64")]
    max_concurrent_probes: usize,

    /// Random delay added before each probe, in milliseconds
    #[arg(long, default_value = "250")]
    probe_jitter_ms: u64,

    /// Port probed when a worker host does not carry one
    #[arg(long, default_value = "7070")]
    probe_port: u16,

    /// Validate the worker configuration, print the resulting fleet and exit
    #[arg(long)]
    check: bool,

    /// Output format for --check
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct FleetWorkerOutput {
    name: String,
    index: u32,
    host: String,
}

#[derive(Serialize)]
struct FleetCheckOutput {
    workers: Vec<FleetWorkerOutput>,
    invalid: Vec<String>,
    duplicates: Vec<String>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(
    source: &dyn WorkerSpecSource,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let fleet = provision(source)?;

    let mut invalid = Vec::new();
    let mut duplicates = Vec::new();
    for error in &fleet.errors {
        match error {
            BuildError::InvalidSpec { .. } => invalid.push(error.to_string()),
            BuildError::DuplicateIdentity { identity } => duplicates.push(identity.to_string()),
        }
    }

    match output_format {
        OutputFormat::Json => {
            let output = FleetCheckOutput {
                workers: fleet
                    .handles
                    .iter()
                    .map(|h| FleetWorkerOutput {
                        name: h.identity().name.clone(),
                        index: h.identity().index,
                        host: h.host.clone(),
                    })
                    .collect(),
                invalid,
                duplicates,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("{:<24} {:<6} HOST", "NAME", "INDEX");
            println!("{}", "-".repeat(50));
            for handle in &fleet.handles {
                println!(
                    "{:<24} {:<6} {}",
                    handle.identity().name,
                    handle.identity().index,
                    handle.host
                );
            }
            println!();
            println!("{} worker(s)", fleet.handles.len());
            for line in &invalid {
                println!("[-] {}", line);
            }
            for identity in &duplicates {
                println!("[-] duplicate {}", identity);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = FleetConfig::new(args.workers).with_monitor(MonitorConfig {
        probe_interval_ms: args.probe_interval_ms,
        probe_timeout_ms: args.probe_timeout_ms,
        max_concurrent_probes: args.max_concurrent_probes,
        probe_jitter_ms: args.probe_jitter_ms,
        default_probe_port: args.probe_port,
    });
    let source = DirectorySource::new(&config.worker_dir);

    if args.check {
        return run_check(&source, &args.output);
    }

    tracing::info!("Starting up version {}", env!("CARGO_PKG_VERSION"));

    let shutdown = install_shutdown_handler()?;
    let engine = Arc::new(LocalEngine::new());
    let prober = Arc::new(TcpProber::new(config.monitor.default_probe_port));

    let controller = FleetController::new(config, source, engine, prober);
    controller.run(shutdown).await?;

    Ok(())
}
