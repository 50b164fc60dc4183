//! In-memory fake loader shared by unit tests

use crate::env::environment::Environment;
use crate::env::loader::Loader;
use crate::error::{KilnError, KilnResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Records every load and answers the safety predicate from a configurable
/// set of hazardous unit names.
#[derive(Default)]
pub(crate) struct RecordingLoader {
    loads: Mutex<Vec<(Uuid, PathBuf)>>,
    hazards: Mutex<HashSet<String>>,
    failing_entries: Mutex<HashSet<PathBuf>>,
    failing_units: Mutex<HashSet<String>>,
}

impl RecordingLoader {
    /// Mark a unit name as defining a protocol or record
    pub fn mark_hazard(&self, unit: &str) {
        lock(&self.hazards).insert(unit.to_string());
    }

    /// Make `load_entry` fail for the given path
    pub fn fail_on(&self, entry: &str) {
        lock(&self.failing_entries).insert(PathBuf::from(entry));
    }

    /// Make the safety predicate fail for the given unit
    pub fn fail_predicate_on(&self, unit: &str) {
        lock(&self.failing_units).insert(unit.to_string());
    }

    /// Entries loaded into the given environment, in load order
    pub fn loads_for(&self, env: Uuid) -> Vec<String> {
        lock(&self.loads)
            .iter()
            .filter(|(id, _)| *id == env)
            .map(|(_, p)| p.display().to_string())
            .collect()
    }

    /// Total number of load calls across all environments
    pub fn total_loads(&self) -> usize {
        lock(&self.loads).len()
    }

    /// Number of distinct environments that received loads
    pub fn environments_seen(&self) -> usize {
        let loads = lock(&self.loads);
        let ids: HashSet<Uuid> = loads.iter().map(|(id, _)| *id).collect();
        ids.len()
    }
}

impl Loader for RecordingLoader {
    fn load_entry(&self, env: &Environment, entry: &Path) -> KilnResult<()> {
        if lock(&self.failing_entries).contains(entry) {
            return Err(KilnError::loader(format!(
                "refusing to load {}",
                entry.display()
            )));
        }
        lock(&self.loads).push((env.id(), entry.to_path_buf()));
        Ok(())
    }

    fn defines_protocol_or_record(&self, _env: &Environment, unit: &str) -> KilnResult<bool> {
        if lock(&self.failing_units).contains(unit) {
            return Err(KilnError::loader(format!("cannot introspect {unit}")));
        }
        Ok(lock(&self.hazards).contains(unit))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
