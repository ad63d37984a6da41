use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::FleetConfig;
use crate::error::{ReservoirError, Result};
use crate::fleet::{BuildError, BuiltFleet, FleetBuilder, WorkerHandle, WorkerRegistry};
use crate::monitor::{HealthMonitor, Prober};
use crate::scheduler::{SchedulerBridge, SchedulingEngine};
use crate::source::{SpecRecord, WorkerSpecSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Loading,
    Provisioning,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Loading => write!(f, "loading"),
            LifecyclePhase::Provisioning => write!(f, "provisioning"),
            LifecyclePhase::Running => write!(f, "running"),
            LifecyclePhase::Draining => write!(f, "draining"),
            LifecyclePhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Outcome of a graceful drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub disabled: usize,
    pub deregistered: usize,
    pub failed: usize,
}

/// Expand loaded records into a fleet.
///
/// Unreadable records and invalid or duplicate specs are logged and skipped.
/// Fails only if nothing survives.
pub fn build_fleet(records: Vec<SpecRecord>) -> Result<BuiltFleet> {
    let mut specs = Vec::with_capacity(records.len());
    let mut unreadable = 0usize;
    for record in records {
        match record {
            Ok(spec) => specs.push(spec),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable worker record");
                unreadable += 1;
            }
        }
    }

    let fleet = FleetBuilder::build(specs);
    let invalid = fleet
        .errors
        .iter()
        .filter(|e| matches!(e, BuildError::InvalidSpec { .. }))
        .count();
    let duplicates = fleet.errors.len() - invalid;
    let rejected = unreadable + invalid;

    if fleet.is_empty() {
        return Err(ReservoirError::EmptyFleet { rejected });
    }

    tracing::info!(
        workers = fleet.handles.len(),
        rejected,
        duplicates,
        "Fleet provisioned"
    );
    Ok(fleet)
}

/// Load `source` and build the fleet in one go.
pub fn provision<S: WorkerSpecSource + ?Sized>(source: &S) -> Result<BuiltFleet> {
    build_fleet(source.load()?)
}

/// Drives the fleet from configuration to shutdown.
///
/// Phases run strictly in order:
/// 1. **Loading**: read worker records from the source
/// 2. **Provisioning**: build handles, drop invalid and duplicate ones
/// 3. **Running**: start the engine, register every handle, start the
///    health monitor and wait for the shutdown token
/// 4. **Draining**: stop the monitor, disable and deregister every worker
/// 5. **Stopped**
///
/// The controller is the only owner of the monitor's cancellation token and
/// cancels it exactly once, at the start of the drain.
pub struct FleetController<S> {
    config: FleetConfig,
    source: S,
    registry: Arc<WorkerRegistry>,
    bridge: SchedulerBridge,
    prober: Arc<dyn Prober>,
    phase: watch::Sender<LifecyclePhase>,
}

impl<S: WorkerSpecSource> FleetController<S> {
    pub fn new(
        config: FleetConfig,
        source: S,
        engine: Arc<dyn SchedulingEngine>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Loading);
        Self {
            config,
            source,
            registry: Arc::new(WorkerRegistry::new()),
            bridge: SchedulerBridge::new(engine),
            prober,
            phase,
        }
    }

    pub fn registry(&self) -> Arc<WorkerRegistry> {
        self.registry.clone()
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: LifecyclePhase) {
        tracing::debug!(%phase, "Lifecycle phase");
        self.phase.send_replace(phase);
    }

    /// Run the whole lifecycle. Returns once the fleet is drained, or early
    /// with a fatal startup error.
    pub async fn run(self, shutdown: CancellationToken) -> Result<DrainReport> {
        self.enter(LifecyclePhase::Loading);
        tracing::info!(dir = %self.config.worker_dir.display(), "Reading worker configuration");
        let records = match self.source.load() {
            Ok(records) => records,
            Err(e) => return self.abort(e),
        };

        self.enter(LifecyclePhase::Provisioning);
        let fleet = match build_fleet(records) {
            Ok(fleet) => fleet,
            Err(e) => return self.abort(e),
        };

        self.enter(LifecyclePhase::Running);
        tracing::info!("Starting up scheduler");
        if let Err(e) = self.bridge.start().await {
            return self.abort(e.into());
        }

        self.install(fleet.handles).await;

        let monitor_cancel = CancellationToken::new();
        let monitor = HealthMonitor::new(
            self.config.monitor.clone(),
            self.registry.clone(),
            self.prober.clone(),
            self.bridge.reporter(),
            monitor_cancel.clone(),
        );
        let monitor_handle = tokio::spawn(monitor.run());

        tracing::info!(workers = self.registry.len(), "Now active");
        shutdown.cancelled().await;

        tracing::info!("Shutdown process starting, draining fleet");
        self.enter(LifecyclePhase::Draining);

        monitor_cancel.cancel();
        if let Err(e) = monitor_handle.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        let report = self.drain().await;
        self.bridge.shutdown().await;
        self.enter(LifecyclePhase::Stopped);

        tracing::info!(
            disabled = report.disabled,
            deregistered = report.deregistered,
            failed = report.failed,
            "Fleet stopped"
        );
        Ok(report)
    }

    fn abort(&self, e: ReservoirError) -> Result<DrainReport> {
        tracing::error!(error = %e, phase = %self.phase(), "Fatal startup failure");
        self.enter(LifecyclePhase::Stopped);
        Err(e)
    }

    /// Insert each handle into the registry and register it with the engine.
    /// A handle the engine refuses is taken back out of the registry.
    async fn install(&self, handles: Vec<WorkerHandle>) {
        let total = handles.len();
        for handle in handles {
            let identity = handle.identity().clone();
            if let Err(e) = self.registry.insert(handle.clone()) {
                tracing::warn!(worker = %identity, error = %e, "Worker not installed");
                continue;
            }
            if let Err(e) = self.bridge.register(&handle).await {
                tracing::warn!(worker = %identity, error = %e, "Engine refused worker registration");
                self.registry.remove(&identity);
            }
        }
        tracing::info!(registered = self.registry.len(), total, "Workers registered");
    }

    async fn drain(&self) -> DrainReport {
        let identities = self.registry.disable_all();
        let mut report = DrainReport {
            disabled: identities.len(),
            ..DrainReport::default()
        };

        for identity in &identities {
            match self.bridge.deregister(identity).await {
                Ok(()) => report.deregistered += 1,
                Err(e) => {
                    tracing::warn!(worker = %identity, error = %e, "Failed to deregister worker");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
