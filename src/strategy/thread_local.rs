//! Per-thread environment slot strategy

use crate::classpath::set::{compatible, DependencySet};
use crate::env::{Environment, EnvironmentBuilder, Loader};
use crate::error::KilnResult;
use crate::safety;
use crate::strategy::split_classpath;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

// Slots are keyed by strategy instance so independent instances never share
// an environment. A slot left behind by a dropped strategy lives until its
// thread exits.
thread_local! {
    static SLOTS: RefCell<HashMap<u64, (DependencySet, Arc<Environment>)>> =
        RefCell::new(HashMap::new());
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// The shared-cache state machine over a single slot private to the
/// calling thread.
///
/// Taking the slot is trivially exclusive, so there is no claim race, and
/// the slot holds a strong reference, so there is no weak-reference decay
/// to handle. The cost is zero cross-thread sharing: each thread warms its
/// own environment.
pub struct ThreadLocalStrategy {
    builder: EnvironmentBuilder,
    instance: u64,
}

impl ThreadLocalStrategy {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Self {
            builder: EnvironmentBuilder::new(loader),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn run<T, F>(&self, classpath: &[PathBuf], units: &[String], worker: F) -> KilnResult<T>
    where
        F: FnOnce(&Arc<Environment>) -> KilnResult<T>,
    {
        let (archives, class_dir) = split_classpath(classpath)?;
        let wanted: DependencySet = archives.iter().copied().collect();

        let slot = SLOTS.with(|s| s.borrow_mut().remove(&self.instance));
        let parent = match slot {
            Some((key, env)) if compatible(&key, &wanted) => {
                let added = self.builder.extend(&env, &archives)?;
                debug!(env = %env.id(), added, "reusing thread-local environment");
                env
            }
            Some((key, _)) => {
                debug!(key = %key.fingerprint(), "thread-local slot incompatible, building fresh");
                self.builder.build(&archives, None)?
            }
            None => self.builder.build(&archives, None)?,
        };

        let build_env = self.builder.build(&[class_dir], Some(Arc::clone(&parent)))?;

        let result = worker(&build_env);

        match &result {
            Ok(_) if safety::safe_for_reuse(self.builder.loader().as_ref(), &build_env, units) => {
                let key = DependencySet::new(parent.entries());
                SLOTS.with(|s| s.borrow_mut().insert(self.instance, (key, parent)));
            }
            Ok(_) => {
                debug!(env = %parent.id(), "unsafe for reuse, discarding thread-local environment");
            }
            Err(_) => {
                debug!(env = %parent.id(), "worker failed, discarding thread-local environment");
            }
        }

        result
    }
}
