//! Caching strategies
//!
//! One strategy instance is selected for the lifetime of the process. Every
//! build call goes through the same contract, `run(classpath, units,
//! worker)`, and the variants differ only in how aggressively they reuse
//! execution environments:
//!
//! | Variant | Reuse | Isolation |
//! |---------|-------|-----------|
//! | [`NaiveStrategy`] | none | full (always a fresh environment) |
//! | [`DirtySharedStrategy`] | one merged environment | none (single-threaded only) |
//! | [`SharedCacheStrategy`] | shared concurrent cache | per-call child environment |
//! | [`ThreadLocalStrategy`] | per-thread slot | per-call child environment |

pub mod dirty_shared;
pub mod naive;
pub mod shared;
pub mod thread_local;

pub use dirty_shared::DirtySharedStrategy;
pub use naive::NaiveStrategy;
pub use shared::SharedCacheStrategy;
pub use thread_local::ThreadLocalStrategy;

use crate::cache::EnvironmentCache;
use crate::classpath::{entry_kind, EntryKind};
use crate::config::Config;
use crate::env::{Environment, Loader};
use crate::error::{KilnError, KilnResult};
use crate::events::EventLog;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Strategy selector, as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Always build fresh, never cache
    Naive,
    /// One process-wide merged environment (single-threaded only)
    DirtyShared,
    /// Shared concurrent cache with the reuse safety check
    Shared,
    /// Per-thread environment slot
    ThreadLocal,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Naive => "naive",
            Self::DirtyShared => "dirty-shared",
            Self::Shared => "shared",
            Self::ThreadLocal => "thread-local",
        };
        write!(f, "{}", name)
    }
}

/// The selected caching strategy for this process.
///
/// A tagged variant rather than a trait object: `run` is generic over the
/// worker's return type, so dynamic dispatch is not an option.
pub enum Strategy {
    Naive(NaiveStrategy),
    DirtyShared(DirtySharedStrategy),
    Shared(SharedCacheStrategy),
    ThreadLocal(ThreadLocalStrategy),
}

impl Strategy {
    /// Produce a ready environment for `classpath`, invoke `worker` with
    /// it, and decide afterwards whether the environment may be reused.
    ///
    /// `units` are the qualified names about to be compiled by `worker`;
    /// the caching variants introspect them afterwards to decide whether
    /// the environment stays reusable.
    pub fn run<T, F>(&self, classpath: &[PathBuf], units: &[String], worker: F) -> KilnResult<T>
    where
        F: FnOnce(&Arc<Environment>) -> KilnResult<T>,
    {
        match self {
            Self::Naive(s) => s.run(classpath, units, worker),
            Self::DirtyShared(s) => s.run(classpath, units, worker),
            Self::Shared(s) => s.run(classpath, units, worker),
            Self::ThreadLocal(s) => s.run(classpath, units, worker),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Naive(_) => StrategyKind::Naive,
            Self::DirtyShared(_) => StrategyKind::DirtyShared,
            Self::Shared(_) => StrategyKind::Shared,
            Self::ThreadLocal(_) => StrategyKind::ThreadLocal,
        }
    }
}

/// Create the strategy selected by configuration.
///
/// The shared variant gets a fresh cache with its own lifecycle and, when
/// enabled, the JSON-lines event log.
pub fn create_strategy(config: &Config, loader: Arc<dyn Loader>) -> Strategy {
    let kind = config.cache.strategy;
    info!(%kind, "selected caching strategy");

    match kind {
        StrategyKind::Naive => Strategy::Naive(NaiveStrategy::new(loader)),
        StrategyKind::DirtyShared => Strategy::DirtyShared(DirtySharedStrategy::new(loader)),
        StrategyKind::Shared => {
            let cache = Arc::new(EnvironmentCache::with_retention(config.cache.retention));
            Strategy::Shared(
                SharedCacheStrategy::new(loader, cache)
                    .with_events(Arc::new(EventLog::new(config))),
            )
        }
        StrategyKind::ThreadLocal => Strategy::ThreadLocal(ThreadLocalStrategy::new(loader)),
    }
}

/// Split a classpath into its archive entries (classpath order, deduped)
/// and its single classes directory.
///
/// Zero or multiple classes directories mean a misconfigured caller, not a
/// transient cache condition; the call aborts before any build work.
pub(crate) fn split_classpath(classpath: &[PathBuf]) -> KilnResult<(Vec<&Path>, &Path)> {
    let mut archives: Vec<&Path> = Vec::new();
    let mut dirs: Vec<&Path> = Vec::new();

    for path in classpath {
        let list = match entry_kind(path) {
            EntryKind::Archive => &mut archives,
            EntryKind::ClassesDir => &mut dirs,
        };
        if !list.contains(&path.as_path()) {
            list.push(path.as_path());
        }
    }

    if dirs.len() != 1 {
        return Err(KilnError::ClasspathShape { dirs: dirs.len() });
    }

    Ok((archives, dirs[0]))
}
