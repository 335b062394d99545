//! Error types for the mudhost game runner.
//!
//! All failure modes of the runner reduce to a small set of variants:
//! a process that could not be spawned, a run file (pid record, restart
//! flag, log file) that could not be read or written, and configuration
//! problems. Reasons are carried as strings so errors stay `Clone` and
//! can travel through completion channels.

use crate::types::ProcessName;
use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

/// Main error type for runner operations.
#[derive(Debug, Clone, Error)]
pub enum RunnerError {
    /// The OS process could not be started at all (missing executable,
    /// permission denied, unusable log file).
    #[error("Failed to spawn {name}: {reason}")]
    SpawnFailed { name: ProcessName, reason: String },

    /// A persisted run file could not be read or written.
    #[error("Run file error at {path}: {reason}")]
    RunFile { path: String, reason: String },

    /// Invalid runner configuration.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl RunnerError {
    pub fn spawn_failed(name: ProcessName, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name,
            reason: reason.into(),
        }
    }

    pub fn run_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RunFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
