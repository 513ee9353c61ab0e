//! Error types for policygraph.
//!
//! Library crates use [`PolicyGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all policygraph operations.
#[derive(Debug, thiserror::Error)]
pub enum PolicyGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error (client construction, robots.txt).
    #[error("network error: {0}")]
    Network(String),

    /// URL or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Persisted graph storage error (locking, malformed records).
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid options or data.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PolicyGraphError>;

impl PolicyGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PolicyGraphError::config("unknown source 'myspace'");
        assert_eq!(err.to_string(), "config error: unknown source 'myspace'");

        let err = PolicyGraphError::validation("overlap_chars must be below max_chunk_chars");
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn io_error_mentions_path() {
        let err = PolicyGraphError::io(
            "/tmp/graph/nodes.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("nodes.jsonl"));
        assert!(msg.contains("gone"));
    }
}
