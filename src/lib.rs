//! Kiln - Execution Environment Cache
//!
//! Reuses expensive-to-construct classloader environments across many
//! independent compile invocations instead of paying full initialization
//! cost every time. The embedding build tool implements [`env::Loader`],
//! picks a [`strategy::Strategy`] once per process, and hands each build
//! call's classpath to [`strategy::Strategy::run`].

pub mod cache;
pub mod classpath;
pub mod config;
pub mod env;
pub mod error;
pub mod events;
pub mod safety;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{KilnError, KilnResult};
pub use strategy::{create_strategy, Strategy, StrategyKind};
