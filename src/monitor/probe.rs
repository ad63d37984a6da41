use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::fleet::{Connection, WorkerHandle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// Liveness check against a single worker.
///
/// Implementations do not need to enforce a deadline themselves; the monitor
/// wraps every call in the configured probe timeout.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, handle: &WorkerHandle) -> Result<Connection, ProbeError>;
}

/// Probes a worker by opening a TCP connection to its host.
#[derive(Debug, Clone)]
pub struct TcpProber {
    default_port: u16,
}

impl TcpProber {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, handle: &WorkerHandle) -> Result<Connection, ProbeError> {
        let target = handle.probe_target(self.default_port);
        let stream = TcpStream::connect(&target)
            .await
            .map_err(|e| ProbeError::Failed(format!("{}: {}", target, e)))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| ProbeError::Failed(format!("{}: {}", target, e)))?;
        Ok(Connection::new(peer_addr))
    }
}

/// Run `prober` against `handle`, turning an elapsed deadline into
/// [`ProbeError::Timeout`].
pub async fn probe_with_timeout(
    prober: &dyn Prober,
    handle: &WorkerHandle,
    timeout: Duration,
) -> Result<Connection, ProbeError> {
    match tokio::time::timeout(timeout, prober.probe(handle)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
