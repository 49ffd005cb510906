//! Error taxonomy for data block operations.

use chrono::{DateTime, Utc};

/// Errors reported by a `DataSpace` backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("row not found: {taskmanager_id}/{generation_id}/{key}")]
    NotFound {
        taskmanager_id: String,
        generation_id: u64,
        key: String,
    },

    #[error("row already exists: {taskmanager_id}/{generation_id}/{key}")]
    AlreadyExists {
        taskmanager_id: String,
        generation_id: u64,
        key: String,
    },

    #[error("dataspace I/O failure: {0}")]
    Io(String),

    #[error("dataspace corrupt at line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

/// Errors raised by headers, metadata and data blocks.
#[derive(Debug, thiserror::Error)]
pub enum DataSpaceError {
    /// Requested key is absent for the task manager/generation.
    #[error("key not found: {key} (taskmanager {taskmanager_id}, generation {generation_id})")]
    KeyNotFound {
        taskmanager_id: String,
        generation_id: u64,
        key: String,
    },

    #[error("data for {key} expired at {expiration_time}")]
    ExpiredData {
        key: String,
        expiration_time: DateTime<Utc>,
    },

    #[error("generation {generation_id} of taskmanager {taskmanager_id} has no successor")]
    GenerationOverflow {
        taskmanager_id: String,
        generation_id: u64,
    },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("value serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DataSpaceError {
    /// Whether this is the recoverable "no value yet" condition.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

impl From<serde_json::Error> for DataSpaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T, E = DataSpaceError> = std::result::Result<T, E>;
