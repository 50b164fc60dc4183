//! Concurrent environment cache with claim/release and weak-reference
//! eviction
//!
//! Maps an archive-only dependency set to a weakly-held environment. The
//! weak references let idle environments be reclaimed without any explicit
//! eviction policy here beyond retiring dead entries lazily on the next
//! insert.
//!
//! # Reuse protocol
//!
//! | Step | Operation | Guarantee |
//! |------|-----------|-----------|
//! | find | `best_match` | compatible key with the largest archive overlap |
//! | take | `claim` | atomic remove: at most one concurrent claimer wins |
//! | give back | `insert` | weak store + sweep of all dead entries |
//!
//! Losing the claim race, or upgrading a decayed weak reference, means
//! building fresh; callers never retry a second-best match.
//!
//! # Retention
//!
//! `Arc`/`Weak` has no soft-reference analogue: a purely weakly-held
//! environment would be reclaimed the moment its build call returned, and
//! nothing would ever be reused. The cache therefore also keeps the most
//! recently inserted environments in a bounded ring of strong references.
//! Aging out of the ring is the reclamation point; the weak map then
//! observes the entry as dead and retires it on the next insert. Entries
//! can still decay under a claimed-but-released environment exactly as
//! with host-managed references: the guarantee is merely bounded instead
//! of memory-pressure-driven.

use crate::classpath::set::{compatible, DependencySet};
use crate::env::environment::Environment;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

/// How many recently inserted environments stay strongly retained by
/// default.
pub const DEFAULT_RETENTION: usize = 8;

struct CacheSlot {
    env: Weak<Environment>,
    cached_at: DateTime<Utc>,
}

struct CacheState {
    slots: HashMap<DependencySet, CacheSlot>,
    retained: VecDeque<Arc<Environment>>,
}

/// Counts reported by [`EnvironmentCache::stats`]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    /// Entries currently stored, dead or alive
    pub entries: usize,
    /// Entries whose environment is still reachable
    pub live: usize,
}

/// Shared store of reusable environments, keyed by archive dependency set.
///
/// Constructed once per process and injected into the strategy, never a
/// module-level singleton.
pub struct EnvironmentCache {
    state: Mutex<CacheState>,
    retention: usize,
}

impl EnvironmentCache {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// A cache retaining at most `retention` recently inserted
    /// environments. Zero disables retention entirely: entries then live
    /// only as long as someone outside the cache holds them.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                retained: VecDeque::new(),
            }),
            retention,
        }
    }

    /// Atomically remove and return the entry for `key`, if present.
    ///
    /// The single locked remove guarantees at-most-one concurrent reuse of
    /// any cached environment. The returned weak reference may have
    /// decayed; the caller upgrades it and falls back to a fresh build on
    /// failure. The retention ring is left untouched; the claimed
    /// environment ages out of it like any other.
    pub fn claim(&self, key: &DependencySet) -> Option<Weak<Environment>> {
        let claimed = self.lock_state().slots.remove(key);
        match &claimed {
            Some(slot) => debug!(
                key = %key.fingerprint(),
                cached_at = %slot.cached_at,
                "claimed cache entry"
            ),
            None => debug!(key = %key.fingerprint(), "cache entry not present"),
        }
        claimed.map(|slot| slot.env)
    }

    /// Store `env` weakly under `key`, retain it strongly in the ring, then
    /// retire every entry in the map whose environment has already been
    /// reclaimed.
    pub fn insert(&self, key: DependencySet, env: &Arc<Environment>) {
        let mut state = self.lock_state();

        state.slots.insert(
            key,
            CacheSlot {
                env: Arc::downgrade(env),
                cached_at: Utc::now(),
            },
        );

        state.retained.retain(|e| !Arc::ptr_eq(e, env));
        state.retained.push_back(Arc::clone(env));
        while state.retained.len() > self.retention {
            state.retained.pop_front();
        }

        let before = state.slots.len();
        state.slots.retain(|_, slot| slot.env.strong_count() > 0);
        let evicted = before - state.slots.len();
        if evicted > 0 {
            debug!(
                evicted,
                remaining = state.slots.len(),
                "swept dead cache entries"
            );
        }
    }

    /// The key compatible with `wanted` that shares the most archive
    /// entries with it, if any. Ties break on whichever is found first.
    pub fn best_match(&self, wanted: &DependencySet) -> Option<DependencySet> {
        let state = self.lock_state();
        let mut best: Option<(&DependencySet, usize)> = None;

        for key in state.slots.keys() {
            if !compatible(key, wanted) {
                continue;
            }
            let overlap = key.intersection_len(wanted);
            if best.map(|(_, n)| overlap > n).unwrap_or(true) {
                best = Some((key, overlap));
            }
        }

        best.map(|(key, _)| key.clone())
    }

    pub fn len(&self) -> usize {
        self.lock_state().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().slots.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats {
            entries: state.slots.len(),
            live: state
                .slots
                .values()
                .filter(|slot| slot.env.strong_count() > 0)
                .count(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        // Consistent even if a holder panicked; recover the state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EnvironmentCache {
    fn default() -> Self {
        Self::new()
    }
}
