//! Execution environments and the host loading primitive
//!
//! An execution environment is an isolated code-loading context: an ordered,
//! append-only list of visible classpath entries chained to an optional
//! parent environment. Constructing one is the expensive operation this
//! crate exists to avoid repeating; the actual loading side effects live
//! behind the [`Loader`] trait implemented by the embedding build tool.

pub mod builder;
pub mod environment;
pub mod loader;

pub use builder::EnvironmentBuilder;
pub use environment::Environment;
pub use loader::Loader;
