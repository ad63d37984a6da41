//! Liveness monitoring for the worker fleet.
//!
//! # Components
//!
//! - [`HealthMonitor`]: periodic probe loop that updates the registry and
//!   reports every state change to the scheduler bridge
//! - [`Prober`]: one liveness check, with [`TcpProber`] as the default
//!
//! # Probe outcome mapping
//!
//! | probe result | new state     |
//! |--------------|---------------|
//! | success      | `Healthy`     |
//! | error        | `Unreachable` |
//! | timeout      | `Unreachable` |
//!
//! `Disabled` workers are never probed and never leave `Disabled`.

pub mod health;
pub mod jitter;
pub mod probe;

pub use health::HealthMonitor;
pub use probe::{probe_with_timeout, ProbeError, Prober, TcpProber};
