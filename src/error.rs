// src/error.rs

//! Unified error handling for the bill watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for billwatch operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fetching or decoding a source feed failed
    #[error("Ingest error for {context}: {message}")]
    Ingest { context: String, message: String },

    /// Record store failure other than a raw SQLite error
    #[error("Store error: {0}")]
    Store(String),

    /// A single-row update touched zero or several rows
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// URL shortening failed; the long URL remains usable
    #[error("Shortening failed for {url}: {reason}")]
    ShorteningFailed { url: String, reason: String },

    /// Fixed parts of a post do not fit the payload limit
    #[error("Post is {length} characters, limit is {limit}")]
    ContentTooLong { length: usize, limit: usize },

    /// Publishing failed
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an ingest error with context.
    pub fn ingest(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Ingest {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }

    /// Create a shortening error.
    pub fn shortening(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ShorteningFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a publish attempt did not go through.
///
/// The variant decides what the scheduler does next: `Auth` stops the run,
/// `Transient` leaves the bill for a later cycle, and `Rejected` retires it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Credentials missing, invalid or revoked
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network trouble, rate limiting or a server-side fault
    #[error("transient failure: {0}")]
    Transient(String),

    /// The target refused this content (too long, duplicate, malformed)
    #[error("content rejected: {0}")]
    Rejected(String),
}

impl PublishError {
    /// Whether no later publish can succeed without operator action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_is_fatal() {
        assert!(PublishError::Auth("bad token".into()).is_fatal());
        assert!(!PublishError::Transient("503".into()).is_fatal());
        assert!(!PublishError::Rejected("too long".into()).is_fatal());
    }

    #[test]
    fn shortening_error_names_url() {
        let err = AppError::shortening("https://example.com/x", "quota exhausted");
        assert_eq!(
            err.to_string(),
            "Shortening failed for https://example.com/x: quota exhausted"
        );
    }
}
