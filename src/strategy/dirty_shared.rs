//! Single merged-environment strategy

use crate::env::{Environment, EnvironmentBuilder, Loader};
use crate::error::KilnResult;
use crate::strategy::split_classpath;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Reuses one strategy-wide environment for every call, only ever appending
/// entries to it.
///
/// The fastest variant and the least sound: successive calls' dependency
/// sets (classes directories included) merge into a single environment,
/// so calls observe each other's code and version conflicts go undetected.
/// Single-threaded callers only; concurrent calls race on load order.
pub struct DirtySharedStrategy {
    builder: EnvironmentBuilder,
    env: Mutex<Option<Arc<Environment>>>,
}

impl DirtySharedStrategy {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Self {
            builder: EnvironmentBuilder::new(loader),
            env: Mutex::new(None),
        }
    }

    pub fn run<T, F>(&self, classpath: &[PathBuf], _units: &[String], worker: F) -> KilnResult<T>
    where
        F: FnOnce(&Arc<Environment>) -> KilnResult<T>,
    {
        split_classpath(classpath)?;

        let env = {
            let mut slot = self.env.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(env) => {
                    let added = self.builder.extend(env, classpath)?;
                    debug!(env = %env.id(), added, "merged call into shared environment");
                    Arc::clone(env)
                }
                None => {
                    let env = self.builder.build(classpath, None)?;
                    *slot = Some(Arc::clone(&env));
                    env
                }
            }
        };

        // No safety check: the environment is never isolated per call, so
        // there is nothing left to protect by refusing reuse.
        worker(&env)
    }
}
