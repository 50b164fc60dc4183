//! Error types for kiln
//!
//! All modules use `KilnResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// All errors that can occur in kiln
#[derive(Error, Debug)]
pub enum KilnError {
    // Classpath errors
    #[error("classpath must contain exactly one classes directory, found {dirs}")]
    ClasspathShape { dirs: usize },

    // Host loader errors
    #[error("loader error: {0}")]
    Loader(String),

    // Configuration errors
    #[error("invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a host loader error
    pub fn loader(reason: impl Into<String>) -> Self {
        Self::Loader(reason.into())
    }

    /// Whether this error indicates a misconfigured caller rather than a
    /// transient condition. Precondition violations abort the build call;
    /// nothing in the cache path should retry them.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::ClasspathShape { .. })
    }
}
