//! Error types for tailview-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tailview-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Log source errors (read failures, rotation races)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Wire decode errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Runtime errors (channel failures, task join failures)
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a config file: path, underlying error
    #[error("failed to read {0}: {1}")]
    ReadFailed(String, String),

    /// Failed to parse config content
    #[error("failed to parse config: {0}")]
    ParseFailed(String),

    /// A value is out of range or inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A failure while reading a log source.
///
/// Carried through the pipeline as data so consumers can surface it next to
/// the records that did arrive, instead of tearing the stream down.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{path} at byte {position}: {message}")]
pub struct SourceError {
    /// Path of the file being read
    pub path: String,
    /// Byte offset at which the failure occurred
    pub position: u64,
    /// Human-readable description
    pub message: String,
}

impl SourceError {
    #[must_use]
    pub fn new(path: impl Into<String>, position: u64, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            position,
            message: message.into(),
        }
    }

    /// Surface a decode failure in-stream at the byte offset the line
    /// started.
    #[must_use]
    pub fn decode(err: &DecodeError, position: u64) -> Self {
        Self::new(
            err.path.clone(),
            position,
            format!("line {}: {}", err.line, err.message),
        )
    }
}

/// A malformed line in a JSONL log file: path, line number, cause
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}:{line}: {message}")]
pub struct DecodeError {
    pub path: String,
    pub line: u64,
    pub message: String,
}

impl DecodeError {
    #[must_use]
    pub fn new(path: impl Into<String>, line: u64, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
