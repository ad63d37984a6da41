use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineStartError};
use crate::fleet::{HealthTransition, WorkerHandle, WorkerIdentity};
use crate::scheduler::engine::{SchedulingEngine, Started};

/// Cheap, cloneable sender for health transitions.
///
/// All clones feed one FIFO channel, so transitions reach the engine in the
/// order they were reported.
#[derive(Debug, Clone)]
pub struct TransitionReporter {
    tx: mpsc::UnboundedSender<HealthTransition>,
}

impl TransitionReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HealthTransition>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fire-and-forget. Transitions reported after the bridge shut down are dropped.
    pub fn report(&self, transition: HealthTransition) {
        if let Err(e) = self.tx.send(transition) {
            tracing::debug!(transition = %e.0, "Bridge closed, transition dropped");
        }
    }
}

/// Narrow interface between the control plane and the scheduling engine.
pub struct SchedulerBridge {
    engine: Arc<dyn SchedulingEngine>,
    reporter: TransitionReporter,
    pending: Mutex<Option<mpsc::UnboundedReceiver<HealthTransition>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    closing: CancellationToken,
}

impl SchedulerBridge {
    pub fn new(engine: Arc<dyn SchedulingEngine>) -> Self {
        let (reporter, rx) = TransitionReporter::channel();
        Self {
            engine,
            reporter,
            pending: Mutex::new(Some(rx)),
            forwarder: Mutex::new(None),
            closing: CancellationToken::new(),
        }
    }

    /// Start the engine and begin forwarding transitions to it.
    pub async fn start(&self) -> Result<Started, EngineStartError> {
        let started = self.engine.start().await?;
        tracing::info!(engine = %started.engine, "Scheduling engine started");

        if let Some(rx) = self.pending.lock().take() {
            let engine = self.engine.clone();
            let closing = self.closing.clone();
            let handle = tokio::spawn(forward_transitions(engine, rx, closing));
            *self.forwarder.lock() = Some(handle);
        }
        Ok(started)
    }

    pub async fn register(&self, handle: &WorkerHandle) -> Result<(), EngineError> {
        self.engine.register(handle).await?;
        tracing::debug!(worker = %handle.identity(), host = %handle.host, "Worker registered");
        Ok(())
    }

    pub async fn deregister(&self, identity: &WorkerIdentity) -> Result<(), EngineError> {
        self.engine.deregister(identity).await?;
        tracing::debug!(worker = %identity, "Worker deregistered");
        Ok(())
    }

    pub fn report_transition(&self, transition: HealthTransition) {
        self.reporter.report(transition);
    }

    /// Sender handed to the health monitor.
    pub fn reporter(&self) -> TransitionReporter {
        self.reporter.clone()
    }

    /// Stop accepting transitions and wait until the queued ones have reached
    /// the engine.
    pub async fn shutdown(&self) {
        self.closing.cancel();
        let forwarder = self.forwarder.lock().take();
        if let Some(handle) = forwarder {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Transition forwarder failed");
            }
        }
    }
}

async fn forward_transitions(
    engine: Arc<dyn SchedulingEngine>,
    mut rx: mpsc::UnboundedReceiver<HealthTransition>,
    closing: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            received = rx.recv() => match received {
                Some(transition) => engine.report_transition(&transition).await,
                None => return,
            },

            _ = closing.cancelled() => break,
        }
    }

    rx.close();
    let mut flushed = 0usize;
    while let Some(transition) = rx.recv().await {
        engine.report_transition(&transition).await;
        flushed += 1;
    }
    tracing::debug!(flushed, "Transition forwarder stopped");
}
