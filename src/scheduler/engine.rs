use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{EngineError, EngineStartError};
use crate::fleet::{HealthTransition, WorkerHandle, WorkerIdentity, WorkerState};

/// Proof that the engine accepted startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub engine: String,
    pub at: DateTime<Utc>,
}

impl Started {
    pub fn now(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            at: Utc::now(),
        }
    }
}

/// The scheduling engine the fleet is registered with.
///
/// Placement and dispatch live behind this trait; the control plane only
/// starts the engine, tells it which workers exist and how healthy they are.
#[async_trait]
pub trait SchedulingEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<Started, EngineStartError>;

    async fn register(&self, handle: &WorkerHandle) -> Result<(), EngineError>;

    async fn deregister(&self, identity: &WorkerIdentity) -> Result<(), EngineError>;

    async fn report_transition(&self, transition: &HealthTransition);
}

/// Engine-side view of a registered worker.
#[derive(Debug, Clone)]
pub struct EngineWorker {
    pub identity: WorkerIdentity,
    pub host: String,
    pub state: WorkerState,
    pub registered_at: Instant,
    pub last_transition: Option<Instant>,
}

impl EngineWorker {
    fn new(handle: &WorkerHandle) -> Self {
        Self {
            identity: handle.identity().clone(),
            host: handle.host.clone(),
            state: WorkerState::Unknown,
            registered_at: Instant::now(),
            last_transition: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == WorkerState::Healthy
    }
}

/// In-process engine that keeps track of registered workers and which of
/// them are currently available for work.
#[derive(Debug, Default)]
pub struct LocalEngine {
    running: AtomicBool,
    workers: RwLock<HashMap<WorkerIdentity, EngineWorker>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Workers that are registered and currently healthy
    pub fn available_workers(&self) -> Vec<WorkerIdentity> {
        let mut ids: Vec<WorkerIdentity> = self
            .workers
            .read()
            .values()
            .filter(|w| w.is_available())
            .map(|w| w.identity.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn worker(&self, identity: &WorkerIdentity) -> Option<EngineWorker> {
        self.workers.read().get(identity).cloned()
    }

    pub fn registered_count(&self) -> usize {
        self.workers.read().len()
    }
}

#[async_trait]
impl SchedulingEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn start(&self) -> Result<Started, EngineStartError> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Local engine already running");
        }
        Ok(Started::now(self.name()))
    }

    async fn register(&self, handle: &WorkerHandle) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        let mut workers = self.workers.write();
        if workers.contains_key(handle.identity()) {
            return Err(EngineError::AlreadyRegistered(handle.identity().clone()));
        }
        workers.insert(handle.identity().clone(), EngineWorker::new(handle));
        tracing::debug!(worker = %handle.identity(), host = %handle.host, "Worker registered with local engine");
        Ok(())
    }

    async fn deregister(&self, identity: &WorkerIdentity) -> Result<(), EngineError> {
        match self.workers.write().remove(identity) {
            Some(_) => Ok(()),
            None => Err(EngineError::NotRegistered(identity.clone())),
        }
    }

    async fn report_transition(&self, transition: &HealthTransition) {
        if let Some(worker) = self.workers.write().get_mut(&transition.identity) {
            worker.state = transition.new;
            worker.last_transition = Some(Instant::now());
        } else {
            tracing::debug!(worker = %transition.identity, "Transition for unregistered worker ignored");
        }
    }
}
