// src/error.rs

//! Unified error handling for the novel watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for novel-notify operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
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

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The supplied novel URL does not identify a book
    #[error("Invalid novel URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Catalog page could not be fetched (network, timeout, non-success status)
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Catalog page carried no recognizable latest chapter
    #[error("No latest chapter found on catalog page for novel {novel_id}")]
    MissingLatestChapter { novel_id: String },

    /// Persistence collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a transient fetch error.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing-latest-chapter parse error.
    pub fn missing_latest_chapter(novel_id: impl Into<String>) -> Self {
        Self::MissingLatestChapter {
            novel_id: novel_id.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Whether the failure should simply be retried on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Http(_) | Self::MissingLatestChapter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::fetch("https://example.com", "timed out").is_transient());
        assert!(AppError::missing_latest_chapter("123").is_transient());
        assert!(!AppError::invalid_url("nope", "no book segment").is_transient());
        assert!(!AppError::storage("disk full").is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::invalid_url("https://example.com/x", "no book segment");
        assert_eq!(
            err.to_string(),
            "Invalid novel URL 'https://example.com/x': no book segment"
        );
    }
}
