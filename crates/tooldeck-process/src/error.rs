//! Error types for managed tool processes

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Process management errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS refused to start the process
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(#[from] io::Error),

    /// The binary resolver could not locate the executable
    #[error("Failed to resolve bin \"{bin}\" of package \"{package}\" from {base_path}: {source}")]
    ResolveFailed {
        package: String,
        bin: String,
        base_path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process exited with a non-zero code
    #[error("{0}")]
    NonZeroExit(String),

    /// The reject pattern of a `wait_for` matched first
    #[error("Rejected by output: {0}")]
    PatternRejected(String),

    /// The process exited before any awaited pattern matched
    #[error("Process \"{name}\" exited before the expected output appeared")]
    ExitedBeforeMatch { name: String },

    /// Matchers cannot be registered once the process is dead
    #[error("Process \"{name}\" has been killed")]
    NotAlive { name: String },

    /// Invalid launch configuration
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),

    /// Settings could not be loaded
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
