//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Definition file not found
    #[error("Definition file not found: {path}")]
    DefinitionNotFound { path: String },

    /// Input line that is not a valid event
    #[error("Invalid event on input line {line}: {message}")]
    InvalidEvent { line: u64, message: String },

    /// Engine error while processing the stream
    #[error("Pipeline execution failed: {0}")]
    Engine(#[from] contracts::MorphError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn definition_not_found(path: impl Into<String>) -> Self {
        Self::DefinitionNotFound { path: path.into() }
    }

    pub fn invalid_event(line: u64, message: impl Into<String>) -> Self {
        Self::InvalidEvent {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
