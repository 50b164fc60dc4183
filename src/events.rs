//! Build-event logging for cache decisions
//!
//! Writes JSON lines to `~/.local/share/kiln/events.log` when enabled.
//! Opt-in via config: most embedders only want the tracing output, but a
//! persistent record of hit/miss/drop decisions is the first thing asked
//! for when a build farm's cache rate regresses.

use crate::config::{Config, ConfigManager};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// File-based event logger that appends JSON lines.
///
/// Writes are synchronous; strategy calls are synchronous and an event is a
/// single short line. The file handle is not held open between events.
pub struct EventLog {
    enabled: bool,
    path: PathBuf,
    // Serializes appends from concurrent build calls.
    write_lock: Mutex<()>,
}

impl EventLog {
    /// Create an event logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.event_log,
            path: ConfigManager::event_log_path(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create an event logger writing to an explicit path (tests)
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            enabled: true,
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one event as a JSON line.
    ///
    /// Silently drops events on IO failure; event logging must never block
    /// or fail the primary build workflow.
    pub fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to serialize event: {}", e);
                return;
            }
        };
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.append(&line) {
            warn!("failed to write event log: {}", e);
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(line.as_bytes())?;
        file.flush()
    }
}
