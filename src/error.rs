use std::path::PathBuf;

use thiserror::Error;

use crate::fleet::WorkerIdentity;

/// Fatal startup failures. Anything that ends up here aborts the process.
#[derive(Error, Debug)]
pub enum ReservoirError {
    #[error("Cannot access worker directory {path}: {source}")]
    ConfigAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No valid workers survived provisioning ({rejected} record(s) rejected)")]
    EmptyFleet { rejected: usize },

    #[error("Scheduling engine failed to start: {0}")]
    EngineStart(#[from] EngineStartError),
}

pub type Result<T> = std::result::Result<T, ReservoirError>;

/// Why the scheduling engine refused to start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct EngineStartError {
    pub reason: String,
}

impl EngineStartError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Non-fatal errors reported by the scheduling engine after startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Worker {0} is already registered")]
    AlreadyRegistered(WorkerIdentity),

    #[error("Worker {0} is not registered")]
    NotRegistered(WorkerIdentity),

    #[error("Engine is not running")]
    NotRunning,

    #[error("Engine error: {0}")]
    Other(String),
}
