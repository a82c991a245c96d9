//! Error types for experiment analysis
//!
//! Every analysis call either fully succeeds or fails synchronously with one of
//! these errors. Numerical degeneracy (zero variance, identical arms) is NOT an
//! error: the comparators return a well-defined degenerate result instead.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while validating or running an analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Out-of-domain input, rejected before any computation
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Unknown option value (correction method, spending function, ...)
    #[error("unsupported {option} '{value}' (supported: {})", .supported.join(", "))]
    UnsupportedConfiguration {
        option: &'static str,
        value: String,
        supported: &'static [&'static str],
    },

    /// Request payload could not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A distribution could not be constructed from validated parameters
    #[error("numerical error: {0}")]
    Numerical(String),
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Build a validation error for a named request field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Validation { .. } => "validation_error",
            AnalysisError::UnsupportedConfiguration { .. } => "unsupported_configuration",
            AnalysisError::MalformedRequest(_) => "malformed_request",
            AnalysisError::Numerical(_) => "numerical_error",
        }
    }

    /// Process exit code used by the CLI (never 0)
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalysisError::Validation { .. } => 2,
            AnalysisError::UnsupportedConfiguration { .. } => 3,
            AnalysisError::MalformedRequest(_) => 4,
            AnalysisError::Numerical(_) => 5,
        }
    }

    /// Error body returned to callers: `{"detail": ..., "kind": ...}`
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            detail: self.to_string(),
            kind: self.kind(),
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::MalformedRequest(err.to_string())
    }
}

/// Serializable error response
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
    pub kind: &'static str,
}
