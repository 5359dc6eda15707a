//! Layered error definitions
//!
//! Categorized by source: config / sink / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
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

    /// Neither the declared kind nor the entry name match a registered sink
    #[error("sink '{name}': unknown sink kind '{kind}'")]
    UnknownSinkKind { name: String, kind: String },

    /// Two entries share the same name in one snapshot
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },

    // ===== Sink Errors =====
    /// Sink I/O error (activate / handle / deactivate)
    #[error("sink '{sink_name}' io error: {message}")]
    SinkIo { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
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

    /// Create unknown sink kind error
    pub fn unknown_sink_kind(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnknownSinkKind {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Create sink I/O error
    pub fn sink_io(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkIo {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// True for the errors that come from a configuration entry rather than
    /// from the medium behind a sink.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
                | Self::UnknownSinkKind { .. }
                | Self::DuplicateSink { .. }
        )
    }
}
