//! Post-use reuse safety check
//!
//! Protocol and raw record definitions mint type identities at load time.
//! If an environment that hosted such a definition is handed to a later
//! build call, the same name can load a second, incompatible identity in
//! the same environment graph and break downstream type checks. Environments
//! contaminated this way must never re-enter the cache.

use crate::env::environment::Environment;
use crate::env::loader::Loader;
use tracing::{debug, warn};

/// Whether any freshly-compiled unit makes its host environment unsafe to
/// cache.
///
/// The host predicate runs inside `env` itself so the query resolves each
/// unit with the same code visibility the compiled artifact had. A predicate
/// failure counts as unsafe: when the host cannot say, the environment is
/// not worth the risk of reoffering.
pub fn unsafe_for_reuse(loader: &dyn Loader, env: &Environment, units: &[String]) -> bool {
    for unit in units {
        match loader.defines_protocol_or_record(env, unit) {
            Ok(true) => {
                debug!(env = %env.id(), unit, "unit defines protocol or record");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(env = %env.id(), unit, error = %e, "safety predicate failed, treating as unsafe");
                return true;
            }
        }
    }
    false
}

/// Convenience wrapper used by the caching strategies: true when the
/// environment may be reoffered.
pub fn safe_for_reuse(loader: &dyn Loader, env: &Environment, units: &[String]) -> bool {
    !unsafe_for_reuse(loader, env, units)
}
