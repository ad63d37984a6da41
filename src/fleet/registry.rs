use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::fleet::worker::{
    Connection, HealthTransition, WorkerHandle, WorkerIdentity, WorkerState,
};
use crate::monitor::ProbeError;
use crate::scheduler::TransitionReporter;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Worker {0} already exists")]
    AlreadyExists(WorkerIdentity),

    #[error("Worker not found: {0}")]
    NotFound(WorkerIdentity),
}

#[derive(Debug)]
struct Entry {
    handle: WorkerHandle,
    state: WorkerState,
}

/// One `(handle, state)` pair copied out of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub handle: WorkerHandle,
    pub state: WorkerState,
}

impl WorkerSnapshot {
    pub fn identity(&self) -> &WorkerIdentity {
        self.handle.identity()
    }
}

/// Authoritative store of the fleet.
///
/// The outer lock guards membership only. Each entry carries its own lock, so
/// a state swap on one worker never waits on another. Neither lock is held
/// across an await point; callers that need to iterate take a [`snapshot`].
///
/// [`snapshot`]: WorkerRegistry::snapshot
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    entries: RwLock<HashMap<WorkerIdentity, Arc<Mutex<Entry>>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle in state `Unknown`.
    pub fn insert(&self, handle: WorkerHandle) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let identity = handle.identity().clone();
        if entries.contains_key(&identity) {
            return Err(RegistryError::AlreadyExists(identity));
        }
        entries.insert(
            identity,
            Arc::new(Mutex::new(Entry {
                handle,
                state: WorkerState::Unknown,
            })),
        );
        Ok(())
    }

    pub fn remove(&self, identity: &WorkerIdentity) -> Option<WorkerHandle> {
        self.entries
            .write()
            .remove(identity)
            .map(|entry| {
                let entry = entry.lock();
                entry.handle.clone()
            })
    }

    fn entry(&self, identity: &WorkerIdentity) -> Result<Arc<Mutex<Entry>>, RegistryError> {
        self.entries
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(identity.clone()))
    }

    /// Atomically replace the state of a worker and return the previous one.
    ///
    /// A `Disabled` worker stays `Disabled`; any other requested state is
    /// ignored and `Disabled` is returned.
    pub fn update_state(
        &self,
        identity: &WorkerIdentity,
        new_state: WorkerState,
    ) -> Result<WorkerState, RegistryError> {
        let entry = self.entry(identity)?;
        let mut entry = entry.lock();
        if entry.state.is_terminal() {
            return Ok(entry.state);
        }
        let previous = std::mem::replace(&mut entry.state, new_state);
        entry.handle.enabled = new_state != WorkerState::Disabled;
        Ok(previous)
    }

    /// Apply a probe result.
    ///
    /// Returns the transition when the state actually changed. A disabled
    /// worker is left as-is: results of probes that were in flight during
    /// drain must not bring it back.
    pub fn record_probe(
        &self,
        identity: &WorkerIdentity,
        result: Result<Connection, ProbeError>,
    ) -> Result<Option<HealthTransition>, RegistryError> {
        self.apply_probe(identity, result, |_| {})
    }

    /// Like [`record_probe`](Self::record_probe), but hands the transition to
    /// `reporter` before the entry lock is released, so reports for one worker
    /// are queued in the order the registry applied them.
    pub fn record_probe_and_report(
        &self,
        identity: &WorkerIdentity,
        result: Result<Connection, ProbeError>,
        reporter: &TransitionReporter,
    ) -> Result<Option<HealthTransition>, RegistryError> {
        self.apply_probe(identity, result, |transition| reporter.report(transition.clone()))
    }

    fn apply_probe<F>(
        &self,
        identity: &WorkerIdentity,
        result: Result<Connection, ProbeError>,
        on_transition: F,
    ) -> Result<Option<HealthTransition>, RegistryError>
    where
        F: FnOnce(&HealthTransition),
    {
        let entry = self.entry(identity)?;
        let mut entry = entry.lock();
        if entry.state.is_terminal() {
            return Ok(None);
        }

        let new_state = match result {
            Ok(connection) => {
                entry.handle.connection = Some(connection);
                entry.handle.status = None;
                WorkerState::Healthy
            }
            Err(e) => {
                entry.handle.status = Some(e.to_string());
                WorkerState::Unreachable
            }
        };

        let old = std::mem::replace(&mut entry.state, new_state);
        if old == new_state {
            return Ok(None);
        }
        let transition = HealthTransition {
            identity: identity.clone(),
            old,
            new: new_state,
        };
        on_transition(&transition);
        Ok(Some(transition))
    }

    pub fn state(&self, identity: &WorkerIdentity) -> Option<WorkerState> {
        let entry = self.entry(identity).ok()?;
        let state = entry.lock().state;
        Some(state)
    }

    pub fn get(&self, identity: &WorkerIdentity) -> Option<WorkerSnapshot> {
        self.entry(identity).ok().map(|entry| {
            let entry = entry.lock();
            WorkerSnapshot {
                handle: entry.handle.clone(),
                state: entry.state,
            }
        })
    }

    /// Copy of every entry, sorted by identity.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        let entries: Vec<Arc<Mutex<Entry>>> = self.entries.read().values().cloned().collect();
        let mut snapshot: Vec<WorkerSnapshot> = entries
            .iter()
            .map(|entry| {
                let entry = entry.lock();
                WorkerSnapshot {
                    handle: entry.handle.clone(),
                    state: entry.state,
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.identity().cmp(b.identity()));
        snapshot
    }

    pub fn identities(&self) -> Vec<WorkerIdentity> {
        let mut ids: Vec<WorkerIdentity> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Move every worker to `Disabled`. Returns the affected identities.
    pub fn disable_all(&self) -> Vec<WorkerIdentity> {
        let ids = self.identities();
        for id in &ids {
            // Entries can only disappear through `remove`, which drain does not race with.
            if let Err(e) = self.update_state(id, WorkerState::Disabled) {
                tracing::debug!(worker = %id, error = %e, "Worker vanished while disabling");
            }
        }
        ids
    }

    pub fn count_in(&self, state: WorkerState) -> usize {
        self.snapshot().iter().filter(|w| w.state == state).count()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
