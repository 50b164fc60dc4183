//! Environment construction and extension
//!
//! Building an environment is the expensive operation the cache exists to
//! avoid. The builder therefore never rebuilds when extension suffices: a
//! cached environment whose dependency set is a compatible subset of the
//! wanted one is only ever appended to.

use crate::env::environment::Environment;
use crate::env::loader::Loader;
use crate::error::KilnResult;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Constructs and extends execution environments through the host [`Loader`]
pub struct EnvironmentBuilder {
    loader: Arc<dyn Loader>,
}

impl EnvironmentBuilder {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &Arc<dyn Loader> {
        &self.loader
    }

    /// Build a new environment whose visible entry list is exactly
    /// `entries` (order preserved, duplicates dropped), chained to `parent`
    /// or the platform-default root.
    pub fn build<P: AsRef<Path>>(
        &self,
        entries: &[P],
        parent: Option<Arc<Environment>>,
    ) -> KilnResult<Arc<Environment>> {
        let env = Arc::new(Environment::new(parent));

        for entry in entries {
            self.attach(&env, entry.as_ref())?;
        }

        debug!(
            env = %env.id(),
            entries = env.entries().len(),
            depth = env.depth(),
            "built environment"
        );
        Ok(env)
    }

    /// Append entries not already present in `env` (its own list, not the
    /// ancestor chain), returning how many were added. Appending a present
    /// entry is a no-op.
    pub fn extend<P: AsRef<Path>>(&self, env: &Environment, entries: &[P]) -> KilnResult<usize> {
        let mut added = 0;
        for entry in entries {
            if self.attach(env, entry.as_ref())? {
                added += 1;
            }
        }

        if added > 0 {
            debug!(env = %env.id(), added, "extended environment");
        }
        Ok(added)
    }

    fn attach(&self, env: &Environment, entry: &Path) -> KilnResult<bool> {
        if !env.push_entry(entry) {
            return Ok(false);
        }
        self.loader.load_entry(env, entry)?;
        Ok(true)
    }
}
