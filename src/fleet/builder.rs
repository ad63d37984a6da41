use std::collections::HashSet;

use thiserror::Error;

use crate::fleet::worker::{WorkerHandle, WorkerIdentity, WorkerSpec};

/// Per-record provisioning failure. Never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid worker spec {spec}: {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("Duplicate worker identity {identity}, keeping the first definition")]
    DuplicateIdentity { identity: WorkerIdentity },
}

/// Output of [`FleetBuilder::build`].
#[derive(Debug, Default)]
pub struct BuiltFleet {
    pub handles: Vec<WorkerHandle>,
    pub errors: Vec<BuildError>,
}

impl BuiltFleet {
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Expands worker specs into handles.
///
/// Handles come out in input order; for each spec, indices run from `0` to
/// `subworker_count - 1`. A name belongs to the first valid spec that uses it:
/// every identity a later spec with the same name would generate is reported
/// as a duplicate, even indices the first spec did not cover.
#[derive(Debug, Default)]
pub struct FleetBuilder {
    claimed: HashSet<String>,
}

impl FleetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<I>(specs: I) -> BuiltFleet
    where
        I: IntoIterator<Item = WorkerSpec>,
    {
        let mut builder = Self::new();
        let mut fleet = BuiltFleet::default();
        for spec in specs {
            builder.expand(&spec, &mut fleet);
        }
        fleet
    }

    fn expand(&mut self, spec: &WorkerSpec, fleet: &mut BuiltFleet) {
        if let Err(reason) = validate(spec) {
            tracing::warn!(spec = %spec.describe(), reason, "Rejecting worker spec");
            fleet.errors.push(BuildError::InvalidSpec {
                spec: spec.describe(),
                reason: reason.to_string(),
            });
            return;
        }

        let duplicate = !self.claimed.insert(spec.name.clone());
        for index in 0..spec.subworker_count {
            let identity = WorkerIdentity::new(spec.name.clone(), index);
            if duplicate {
                tracing::warn!(worker = %identity, spec = %spec.describe(), "Duplicate worker identity dropped");
                fleet.errors.push(BuildError::DuplicateIdentity { identity });
                continue;
            }
            tracing::debug!(worker = %identity, host = %spec.host, "Worker provisioned");
            fleet.handles.push(WorkerHandle::new(identity, spec.host.clone()));
        }
    }
}

fn validate(spec: &WorkerSpec) -> std::result::Result<(), &'static str> {
    if spec.name.trim().is_empty() {
        return Err("\"name\" is empty");
    }
    if spec.host.trim().is_empty() {
        return Err("\"host\" is empty");
    }
    if spec.subworker_count == 0 {
        return Err("\"subworkers\" must be greater than zero");
    }
    Ok(())
}
