//! Error types for the fix engine.

use thiserror::Error;

/// Errors that can occur while checking or fixing a document.
#[derive(Debug, Error)]
pub enum LintError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File access error with path context.
    #[error("File error: {0}")]
    File(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LintError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a file error.
    pub fn file(message: impl Into<String>) -> Self {
        Self::File(message.into())
    }
}
