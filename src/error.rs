//! Error types and handling for Oersted
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Oersted operations
pub type Result<T> = std::result::Result<T, OerstedError>;

/// Main error type for Oersted
#[derive(Debug, Error)]
pub enum OerstedError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid or rejected access token (empty metering-point result)
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Price data not (yet) published by the API
    #[error("No data: {message}")]
    NoData { message: String },

    /// Malformed or unexpected API responses
    #[error("API error: {message}")]
    Api { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl OerstedError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        OerstedError::Config {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        OerstedError::Auth {
            message: message.into(),
        }
    }

    /// Create a new no-data error
    pub fn no_data<S: Into<String>>(message: S) -> Self {
        OerstedError::NoData {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        OerstedError::Api {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        OerstedError::Network {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        OerstedError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        OerstedError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        OerstedError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        OerstedError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error means the access token was rejected
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, OerstedError::Auth { .. })
    }

    /// Whether this error means requested prices are not published yet
    pub fn is_no_data(&self) -> bool {
        matches!(self, OerstedError::NoData { .. })
    }
}

impl From<std::io::Error> for OerstedError {
    fn from(err: std::io::Error) -> Self {
        OerstedError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for OerstedError {
    fn from(err: serde_yaml::Error) -> Self {
        OerstedError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for OerstedError {
    fn from(err: serde_json::Error) -> Self {
        OerstedError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for OerstedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OerstedError::timeout(err.to_string())
        } else {
            OerstedError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for OerstedError {
    fn from(err: chrono::ParseError) -> Self {
        OerstedError::validation("datetime", &err.to_string())
    }
}

impl From<chrono::RoundingError> for OerstedError {
    fn from(err: chrono::RoundingError) -> Self {
        OerstedError::validation("datetime", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OerstedError::config("test config error");
        assert!(matches!(err, OerstedError::Config { .. }));

        let err = OerstedError::auth("token rejected");
        assert!(err.is_invalid_token());
        assert!(!err.is_no_data());

        let err = OerstedError::no_data("tomorrow not published");
        assert!(err.is_no_data());

        let err = OerstedError::validation("field", "test validation error");
        assert!(matches!(err, OerstedError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = OerstedError::auth("invalid access token");
        assert_eq!(
            format!("{}", err),
            "Authentication error: invalid access token"
        );

        let err = OerstedError::validation("api.mpid", "cannot be empty");
        assert_eq!(
            format!("{}", err),
            "Validation error: api.mpid - cannot be empty"
        );
    }
}
