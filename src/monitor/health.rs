use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::fleet::{WorkerIdentity, WorkerRegistry, WorkerSnapshot, WorkerState};
use crate::monitor::jitter::random_probe_jitter;
use crate::monitor::probe::{probe_with_timeout, Prober};
use crate::scheduler::TransitionReporter;

/// Keeps the registry's view of worker liveness current.
///
/// Every `probe_interval` the monitor takes a snapshot of the registry and
/// spawns one short-lived probe task per worker. Tasks share a semaphore of
/// `max_concurrent_probes` permits, so a large fleet never has more than that
/// many connections open at once. A worker whose previous probe has not
/// finished is skipped for the cycle.
///
/// Stopping is cooperative: once the cancellation token fires no new cycle
/// starts and queued probes give up, while probes already talking to a host
/// run until they finish or hit `probe_timeout`.
pub struct HealthMonitor {
    config: MonitorConfig,
    registry: Arc<WorkerRegistry>,
    prober: Arc<dyn Prober>,
    reporter: TransitionReporter,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
}

impl HealthMonitor {
    pub fn new(
        config: MonitorConfig,
        registry: Arc<WorkerRegistry>,
        prober: Arc<dyn Prober>,
        reporter: TransitionReporter,
        cancel: CancellationToken,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_probes.max(1)));
        Self {
            config,
            registry,
            prober,
            reporter,
            cancel,
            permits,
        }
    }

    /// Run probe cycles until cancelled, then wait for in-flight probes.
    pub async fn run(self) {
        let mut probes: JoinSet<WorkerIdentity> = JoinSet::new();
        let mut in_flight: HashMap<WorkerIdentity, tokio::task::Id> = HashMap::new();
        let mut interval = tokio::time::interval(self.config.probe_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.config.probe_interval_ms,
            timeout_ms = self.config.probe_timeout_ms,
            max_concurrent = self.config.max_concurrent_probes,
            "Health monitor started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(joined) = probes.join_next(), if !probes.is_empty() => {
                    reap(joined, &mut in_flight);
                }

                _ = interval.tick() => {
                    let mut dispatched = 0usize;
                    for worker in self.registry.snapshot() {
                        if worker.state.is_terminal() || in_flight.contains_key(worker.identity()) {
                            continue;
                        }
                        let identity = worker.identity().clone();
                        let abort = probes.spawn(self.probe_task(worker, self.config.probe_jitter()));
                        in_flight.insert(identity, abort.id());
                        dispatched += 1;
                    }
                    tracing::debug!(dispatched, in_flight = in_flight.len(), "Probe cycle dispatched");
                }
            }
        }

        tracing::info!(
            in_flight = probes.len(),
            "Health monitor stopping, waiting for in-flight probes"
        );
        while let Some(joined) = probes.join_next().await {
            reap(joined, &mut in_flight);
        }
        tracing::info!("Health monitor stopped");
    }

    /// Probe every enabled worker once, without jitter, and wait for all
    /// results. Shares the permit pool with `run`.
    pub async fn probe_all(&self) {
        let mut probes = JoinSet::new();
        for worker in self.registry.snapshot() {
            if worker.state.is_terminal() {
                continue;
            }
            probes.spawn(self.probe_task(worker, Duration::ZERO));
        }
        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Probe task failed");
            }
        }
    }

    fn probe_task(
        &self,
        worker: WorkerSnapshot,
        max_jitter: Duration,
    ) -> impl std::future::Future<Output = WorkerIdentity> + Send + 'static {
        let registry = self.registry.clone();
        let prober = self.prober.clone();
        let reporter = self.reporter.clone();
        let cancel = self.cancel.clone();
        let permits = self.permits.clone();
        let timeout = self.config.probe_timeout();

        async move {
            let identity = worker.identity().clone();

            let delay = random_probe_jitter(max_jitter);
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return identity,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let _permit = tokio::select! {
                _ = cancel.cancelled() => return identity,
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return identity,
                },
            };

            let result = probe_with_timeout(prober.as_ref(), &worker.handle, timeout).await;
            if let Err(ref e) = result {
                tracing::debug!(worker = %identity, host = %worker.handle.host, error = %e, "Probe failed");
            }

            match registry.record_probe_and_report(&identity, result, &reporter) {
                Ok(Some(transition)) => {
                    if transition.new == WorkerState::Healthy {
                        tracing::info!(worker = %identity, from = %transition.old, "Worker is healthy");
                    } else {
                        tracing::warn!(worker = %identity, from = %transition.old, to = %transition.new, "Worker health changed");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(worker = %identity, error = %e, "Dropping probe result for removed worker");
                }
            }

            identity
        }
    }
}

fn reap(
    joined: Result<WorkerIdentity, JoinError>,
    in_flight: &mut HashMap<WorkerIdentity, tokio::task::Id>,
) {
    match joined {
        Ok(identity) => {
            in_flight.remove(&identity);
        }
        Err(e) => {
            tracing::error!(error = %e, "Probe task failed");
            let failed = e.id();
            in_flight.retain(|_, id| *id != failed);
        }
    }
}
