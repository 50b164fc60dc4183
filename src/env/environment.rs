//! Execution environment state

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// A constructed, stateful code-loading context.
///
/// Entries are visible to this environment and all its descendants. The
/// entry list is append-only: entries already loaded can never be removed,
/// and loading a second definition for an already-loaded unit name anywhere
/// in the same environment graph corrupts it (the reason the reuse safety
/// check exists).
#[derive(Debug)]
pub struct Environment {
    /// Unique id, for host bookkeeping and log correlation
    id: Uuid,

    /// Parent environment; `None` means the platform-default root
    parent: Option<Arc<Environment>>,

    /// Entries loaded directly into this environment, in load order.
    /// Appended under claim-exclusivity; the mutex exists because `Arc`
    /// sharing requires interior mutability.
    entries: Mutex<Vec<PathBuf>>,
}

impl Environment {
    pub(crate) fn new(parent: Option<Arc<Environment>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn parent(&self) -> Option<&Arc<Environment>> {
        self.parent.as_ref()
    }

    /// Snapshot of the entries loaded directly into this environment
    pub fn entries(&self) -> Vec<PathBuf> {
        self.lock_entries().clone()
    }

    /// Whether `path` is loaded directly into this environment
    pub fn contains(&self, path: &Path) -> bool {
        self.lock_entries().iter().any(|e| e == path)
    }

    /// Whether `path` is visible here: loaded into this environment or any
    /// ancestor
    pub fn visible(&self, path: &Path) -> bool {
        if self.contains(path) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.visible(path),
            None => false,
        }
    }

    /// Chain length from here to the platform root
    pub fn depth(&self) -> usize {
        match &self.parent {
            Some(parent) => parent.depth() + 1,
            None => 1,
        }
    }

    /// Append an entry if not already present; returns whether it was added
    pub(crate) fn push_entry(&self, path: &Path) -> bool {
        let mut entries = self.lock_entries();
        if entries.iter().any(|e| e == path) {
            return false;
        }
        entries.push(path.to_path_buf());
        true
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        // A poisoned lock still holds a consistent list; recover it.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
