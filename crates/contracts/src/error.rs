//! Layered error definitions
//!
//! Categorized by source: config / structure / pattern / dispatch / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum MorphError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Structural Errors =====
    /// Unbalanced or misplaced record/entity events
    #[error("structural error{}: {message}", describe_record(.record_id))]
    Structural {
        record_id: Option<String>,
        message: String,
    },

    // ===== Registration Errors =====
    /// Pattern rejected at registration time
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Empty key, separator or otherwise unusable identifier
    #[error("invalid identifier: {message}")]
    InvalidIdentifier { message: String },

    /// Stage id not owned by this dispatcher
    #[error("unknown stage id {id}")]
    UnknownStage { id: usize },

    // ===== Dispatch Errors =====
    /// A stage failed while receiving or flushing
    #[error("stage '{stage}' failed on '{path}': {source}")]
    Dispatch {
        path: String,
        stage: String,
        #[source]
        source: StageError,
    },

    /// Feedback or pipe chain exceeded the configured depth
    #[error("feedback depth {depth} exceeded while dispatching '{path}'")]
    FeedbackDepth { path: String, depth: usize },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

fn describe_record(record_id: &Option<String>) -> String {
    match record_id {
        Some(id) => format!(" in record '{id}'"),
        None => String::new(),
    }
}

impl MorphError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create structural error
    pub fn structural(record_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::Structural {
            record_id: record_id.map(str::to_string),
            message: message.into(),
        }
    }

    /// Create invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create invalid identifier error
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error is a structural violation of the event stream
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}

/// Error raised by a stage from `receive`, `flush` or `close`
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StageError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StageError {
    /// Create a stage error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a stage error wrapping an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Error message without the source chain
    pub fn message(&self) -> &str {
        &self.message
    }
}
