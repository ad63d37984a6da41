use std::path::PathBuf;
use std::time::Duration;

/// Default directory holding worker definition files.
pub const DEFAULT_WORKER_DIR: &str = "workers";

/// Lower bound applied to the probe interval and timeout.
pub const MIN_PROBE_MS: u64 = 1;

/// Configuration for the health monitor.
///
/// Probing is a plain TCP connect against the worker host, bounded by
/// `probe_timeout_ms`. A probe that times out counts as a failure.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between the start of two probe cycles
    pub probe_interval_ms: u64,
    /// Upper bound for a single probe
    pub probe_timeout_ms: u64,
    /// Maximum number of probes running at once across the whole fleet
    pub max_concurrent_probes: usize,
    /// Each probe is delayed by a random amount in `[0, probe_jitter_ms]`
    pub probe_jitter_ms: u64,
    /// Port used when a worker host does not carry one (e.g. "10.0.0.1")
    pub default_probe_port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 5000,
            probe_timeout_ms: 1000,
            max_concurrent_probes: 64,
            probe_jitter_ms: 250,
            default_probe_port: 7070,
        }
    }
}

impl MonitorConfig {
    /// Never zero: a zero period would stop the monitor before its first cycle.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms.max(MIN_PROBE_MS))
    }

    /// Never zero, so every probe gets a chance to connect.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(MIN_PROBE_MS))
    }

    pub fn probe_jitter(&self) -> Duration {
        Duration::from_millis(self.probe_jitter_ms)
    }
}

#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Directory walked for worker definition files
    pub worker_dir: PathBuf,
    pub monitor: MonitorConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            worker_dir: PathBuf::from(DEFAULT_WORKER_DIR),
            monitor: MonitorConfig::default(),
        }
    }
}

impl FleetConfig {
    pub fn new(worker_dir: impl Into<PathBuf>) -> Self {
        Self {
            worker_dir: worker_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }
}
