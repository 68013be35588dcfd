//! Error types for cmd-runner.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for cmd-runner operations.
#[derive(Error, Debug)]
pub enum CmdRunnerError {
    /// The child process could not be created.
    #[error("failed to execute command '{command}' (directory {}): {source}", .directory.display())]
    Spawn {
        command: String,
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The command string contained no program to run.
    #[error("empty command")]
    EmptyCommand,

    /// I/O error while driving the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Convenience Result type for cmd-runner operations.
pub type Result<T> = std::result::Result<T, CmdRunnerError>;
