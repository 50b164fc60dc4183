//! Shared-cache strategy with the reuse safety check
//!
//! The full state machine: build-or-claim, invoke, safety-check,
//! retain-or-drop. Archive entries live in a parent environment that cycles
//! through the shared cache; the call's classes directory is layered on top
//! in a child environment that is always fresh and never cached; it holds
//! the call's own not-yet-stable output.

use crate::cache::EnvironmentCache;
use crate::classpath::set::DependencySet;
use crate::env::{Environment, EnvironmentBuilder, Loader};
use crate::error::KilnResult;
use crate::events::EventLog;
use crate::safety;
use crate::strategy::split_classpath;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Caches archive-only parent environments in a shared concurrent store,
/// reusing the best compatible match for each call.
pub struct SharedCacheStrategy {
    builder: EnvironmentBuilder,
    cache: Arc<EnvironmentCache>,
    events: Option<Arc<EventLog>>,
}

impl SharedCacheStrategy {
    /// The cache is injected so embedders (and tests) control its
    /// lifecycle; one cache per process is the expected shape.
    pub fn new(loader: Arc<dyn Loader>, cache: Arc<EnvironmentCache>) -> Self {
        Self {
            builder: EnvironmentBuilder::new(loader),
            cache,
            events: None,
        }
    }

    /// Attach the JSON-lines event log
    pub fn with_events(mut self, events: Arc<EventLog>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cache(&self) -> &Arc<EnvironmentCache> {
        &self.cache
    }

    pub fn run<T, F>(&self, classpath: &[PathBuf], units: &[String], worker: F) -> KilnResult<T>
    where
        F: FnOnce(&Arc<Environment>) -> KilnResult<T>,
    {
        let (archives, class_dir) = split_classpath(classpath)?;
        let wanted: DependencySet = archives.iter().copied().collect();

        let parent = self.acquire_parent(&wanted, &archives)?;

        // The child is rebuilt every call: it carries the classes directory
        // whose contents this very call is about to produce.
        let build_env = self.builder.build(&[class_dir], Some(Arc::clone(&parent)))?;

        let result = worker(&build_env);

        match &result {
            Ok(_) => self.retain_or_drop(parent, &build_env, units),
            Err(_) => {
                // A failed worker may have half-loaded anything; treat the
                // environment as contaminated.
                debug!(env = %parent.id(), "worker failed, environment not reoffered");
            }
        }

        result
    }

    /// Find, claim, and extend a compatible cached parent, or build one
    /// fresh from the call's archive entries.
    fn acquire_parent(
        &self,
        wanted: &DependencySet,
        archives: &[&Path],
    ) -> KilnResult<Arc<Environment>> {
        if let Some(key) = self.cache.best_match(wanted) {
            match self.cache.claim(&key).and_then(|weak| weak.upgrade()) {
                Some(env) => {
                    let added = self.builder.extend(&env, archives)?;
                    debug!(
                        env = %env.id(),
                        key = %key.fingerprint(),
                        added,
                        "reusing claimed environment"
                    );
                    self.emit("cache.hit", &env, wanted);
                    return Ok(env);
                }
                // Lost the claim race or the weak reference decayed. Build
                // fresh rather than retrying a second-best match.
                None => debug!(key = %key.fingerprint(), "claim failed, building fresh"),
            }
        }

        let env = self.builder.build(archives, None)?;
        self.emit("cache.miss", &env, wanted);
        Ok(env)
    }

    /// Reoffer the archive-only parent under the dependency set of its
    /// final entry list, unless this call made it unsafe to share.
    fn retain_or_drop(&self, parent: Arc<Environment>, build_env: &Environment, units: &[String]) {
        if safety::safe_for_reuse(self.builder.loader().as_ref(), build_env, units) {
            let key = DependencySet::new(parent.entries());
            self.emit("cache.insert", &parent, &key);
            self.cache.insert(key, &parent);
        } else {
            debug!(env = %parent.id(), "unsafe for reuse, dropping environment");
            self.emit("cache.unsafe_drop", &parent, &DependencySet::new(parent.entries()));
        }
    }

    fn emit(&self, event: &str, env: &Environment, key: &DependencySet) {
        if let Some(events) = &self.events {
            events.log(
                event,
                &serde_json::json!({
                    "env": env.id(),
                    "key": key.fingerprint(),
                    "cache": self.cache.stats(),
                }),
            );
        }
    }
}
