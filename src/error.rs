//! Error types and handling for the `FieldSense` service

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Distinguishes a remediable credential problem from any other generation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisoryErrorCode {
    ApiKeyInvalid,
    GenericError,
}

impl AdvisoryErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AdvisoryErrorCode::ApiKeyInvalid => "API_KEY_INVALID",
            AdvisoryErrorCode::GenericError => "GENERIC_ERROR",
        }
    }
}

/// Main error type for the `FieldSense` service
#[derive(Error, Debug)]
pub enum FieldSenseError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Upstream answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failures talking to an upstream
    #[error("Network error: {message}")]
    Network { message: String },

    /// Upstream did not answer in time
    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout { operation: String, after: Duration },

    /// Upstream answered but the payload was unusable
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Every candidate model failed
    #[error("Generation failed ({}): {message}", .code.as_str())]
    Generation {
        message: String,
        code: AdvisoryErrorCode,
    },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl FieldSenseError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn api<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn generation<S: Into<String>>(message: S, code: AdvisoryErrorCode) -> Self {
        Self::Generation {
            message: message.into(),
            code,
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            FieldSenseError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            FieldSenseError::Validation { message } => message.clone(),
            FieldSenseError::Api { .. }
            | FieldSenseError::Network { .. }
            | FieldSenseError::Timeout { .. }
            | FieldSenseError::Parse { .. } => {
                "Unable to reach external services. Please try again shortly.".to_string()
            }
            FieldSenseError::Generation { message, .. } => message.clone(),
            FieldSenseError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            FieldSenseError::General { message } => message.clone(),
        }
    }
}

impl From<reqwest::Error> for FieldSenseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FieldSenseError::parse(err.to_string())
        } else if let Some(status) = err.status() {
            FieldSenseError::api(status.as_u16(), err.to_string())
        } else {
            FieldSenseError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FieldSenseError {
    fn from(err: serde_json::Error) -> Self {
        FieldSenseError::parse(err.to_string())
    }
}
