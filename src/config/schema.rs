//! Configuration schema for kiln
//!
//! Configuration is stored at `~/.config/kiln/config.toml`

use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Environment cache settings
    pub cache: CacheSettings,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Write cache decisions to the JSON-lines event log
    pub event_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            event_log: false,
        }
    }
}

/// Environment cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Which caching strategy to use for the lifetime of the process
    pub strategy: StrategyKind,

    /// How many recently used environments the shared cache keeps strongly
    /// retained (see `cache::DEFAULT_RETENTION`)
    pub retention: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Shared,
            retention: crate::cache::DEFAULT_RETENTION,
        }
    }
}
