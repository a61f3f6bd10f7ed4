//! Error types for the learning machine.
//!
//! Every failure of the sampler and the model engine is reported through
//! [`MachineError`]. The only failure that is deliberately *not* an error is a
//! malformed identity token, which decodes to a `-1` sentinel instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the learning machine.
#[derive(Debug, Error)]
pub enum MachineError {
    // Sampler errors
    #[error("Index {index} out of range for a store of {size} samples")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("Cannot draw {requested} samples: only {available} left in the pool")]
    InsufficientPool { requested: usize, available: usize },

    #[error("Sample store error: {message}")]
    Store { message: String },

    #[error("Corrupt exclusion list at {path}: invalid entry {entry:?}")]
    CorruptExclusions { path: PathBuf, entry: String },

    // Weight errors
    #[error("Weights unavailable from {url}: {message}")]
    WeightsUnavailable { url: String, message: String },

    #[error("Weights integrity check failed: expected {expected}, got {actual}")]
    WeightsIntegrity { expected: String, actual: String },

    #[error("Invalid checkpoint: {message}")]
    Checkpoint { message: String },

    // Model errors
    #[error("Shape mismatch: {message}")]
    Shape { message: String },

    // Key resolution errors
    #[error("Unknown model key: {0}")]
    UnknownModel(String),

    #[error("Unknown dataset key: {0}")]
    UnknownDataset(String),

    // Request errors
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for learning machine operations.
pub type Result<T> = std::result::Result<T, MachineError>;

impl From<std::io::Error> for MachineError {
    fn from(err: std::io::Error) -> Self {
        MachineError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MachineError {
    fn from(err: serde_json::Error) -> Self {
        MachineError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl MachineError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MachineError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a store error from any displayable cause.
    pub fn store(message: impl Into<String>) -> Self {
        MachineError::Store {
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Weights could not be downloaded
    /// - -32001: Sample not found / index out of range
    /// - -32002: Unknown model or dataset key
    /// - -32003: Sample pool exhausted
    /// - -32004: Weights integrity failure
    /// - -32005: Validation error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            MachineError::WeightsUnavailable { .. } => -32000,

            MachineError::IndexOutOfRange { .. } => -32001,

            MachineError::UnknownModel(_) | MachineError::UnknownDataset(_) => -32002,

            MachineError::InsufficientPool { .. } => -32003,

            MachineError::WeightsIntegrity { .. } => -32004,

            MachineError::Validation { .. } | MachineError::Shape { .. } => -32005,

            MachineError::InvalidParams { .. } => -32602,

            _ => -32603,
        }
    }
}
