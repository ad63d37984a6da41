//! In-memory model of the worker fleet.
//!
//! - [`WorkerSpec`]: one declarative record from configuration
//! - [`FleetBuilder`]: expands specs into [`WorkerHandle`]s, one per replica
//! - [`WorkerRegistry`]: concurrency-safe identity -> (handle, state) store

pub mod builder;
pub mod registry;
pub mod worker;

pub use builder::{BuildError, BuiltFleet, FleetBuilder};
pub use registry::{RegistryError, WorkerRegistry, WorkerSnapshot};
pub use worker::{
    Connection, HealthTransition, WorkerHandle, WorkerIdentity, WorkerSpec, WorkerState,
};
