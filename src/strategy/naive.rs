//! Always-fresh baseline strategy

use crate::env::{Environment, EnvironmentBuilder, Loader};
use crate::error::KilnResult;
use crate::strategy::split_classpath;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Builds a fresh environment for every call and discards it afterwards.
///
/// Pays full construction cost every time; exists as the correctness
/// reference the caching variants must be indistinguishable from.
pub struct NaiveStrategy {
    builder: EnvironmentBuilder,
}

impl NaiveStrategy {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Self {
            builder: EnvironmentBuilder::new(loader),
        }
    }

    pub fn run<T, F>(&self, classpath: &[PathBuf], _units: &[String], worker: F) -> KilnResult<T>
    where
        F: FnOnce(&Arc<Environment>) -> KilnResult<T>,
    {
        // Validates the classpath shape; entries load in classpath order.
        split_classpath(classpath)?;

        let env = self.builder.build(classpath, None)?;
        debug!(env = %env.id(), "fresh environment, no caching");
        worker(&env)
    }
}
