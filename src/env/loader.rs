//! Host loading primitive
//!
//! Kiln tracks which entries are visible where; the embedding build tool
//! performs the actual loading. This trait is the whole outbound surface:
//! one hook per entry made visible, plus the reuse-safety predicate.

use crate::env::environment::Environment;
use crate::error::KilnResult;
use std::path::Path;

/// The minimal primitive kiln requires from the host runtime.
///
/// Implementations must be callable from any thread; independent build
/// calls may load into distinct environments concurrently.
pub trait Loader: Send + Sync {
    /// Called once for every entry as it becomes visible to `env`, in load
    /// order, at environment creation and on each later extension.
    fn load_entry(&self, env: &Environment, entry: &Path) -> KilnResult<()>;

    /// Whether the named compiled unit defines a polymorphic-dispatch
    /// protocol or a raw record type.
    ///
    /// Evaluated with `env`'s own code visibility, not the caller's: the
    /// query must resolve the unit the way the compiled artifact did. The
    /// mechanism is host-specific and opaque to kiln.
    fn defines_protocol_or_record(&self, env: &Environment, unit: &str) -> KilnResult<bool>;
}
