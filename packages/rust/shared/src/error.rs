//! Error types for Lexibase.
//!
//! Library crates use [`LexibaseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Lexibase operations.
#[derive(Debug, thiserror::Error)]
pub enum LexibaseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a page. Non-fatal per URL:
    /// the crawler records it and moves on.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Embedding provider failure. Fatal for the document being ingested,
    /// isolated from the rest of the run.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Store(String),

    /// Language-model transport or response error.
    #[error("model error: {0}")]
    Model(String),

    /// The intent classifier returned something outside the closed label set.
    #[error("unparseable intent classification: {raw}")]
    IntentParse { raw: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, malformed seed file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LexibaseError>;

impl LexibaseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
