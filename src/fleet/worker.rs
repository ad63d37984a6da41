use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declarative worker definition, as read from one configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub name: String,
    pub host: String,
    pub subworker_count: u32,
    /// File the record was read from, if any
    pub origin: Option<PathBuf>,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, host: impl Into<String>, subworker_count: u32) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            subworker_count,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Human-readable reference used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.origin {
            Some(path) => format!("{} (name {:?})", path.display(), self.name),
            None => format!("name {:?}", self.name),
        }
    }
}

/// Stable identity of one worker replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub name: String,
    pub index: u32,
}

impl WorkerIdentity {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    Unknown,
    Healthy,
    Unreachable,
    Disabled,
}

impl WorkerState {
    /// `Disabled` is only entered during drain and is never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Disabled)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Unknown => write!(f, "unknown"),
            WorkerState::Healthy => write!(f, "healthy"),
            WorkerState::Unreachable => write!(f, "unreachable"),
            WorkerState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Result of the last successful contact with a worker host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub peer_addr: SocketAddr,
    pub established_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            established_at: Utc::now(),
        }
    }
}

/// Runtime unit of scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    identity: WorkerIdentity,
    pub host: String,
    /// Absent until the first successful probe
    pub connection: Option<Connection>,
    /// Diagnostic from the last failed probe
    pub status: Option<String>,
    pub enabled: bool,
}

impl WorkerHandle {
    pub fn new(identity: WorkerIdentity, host: impl Into<String>) -> Self {
        Self {
            identity,
            host: host.into(),
            connection: None,
            status: None,
            enabled: true,
        }
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// `host:port` to probe. Hosts that already carry a port are used as-is.
    pub fn probe_target(&self, default_port: u16) -> String {
        let host = self.host.trim();
        if host.parse::<SocketAddr>().is_ok() {
            return host.to_string();
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            return SocketAddr::new(ip, default_port).to_string();
        }
        match host.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => host.to_string(),
            _ => format!("{}:{}", host, default_port),
        }
    }
}

/// A change of [`WorkerState`] observed by the health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTransition {
    pub identity: WorkerIdentity,
    pub old: WorkerState,
    pub new: WorkerState,
}

impl fmt::Display for HealthTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.identity, self.old, self.new)
    }
}
