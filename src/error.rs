//! Error types shared by the store, the history log and the storage adapters

use thiserror::Error;

/// Malformed user input, rejected before any state is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Timer name must not be empty")]
    EmptyName,

    #[error("Timer duration must be greater than zero seconds")]
    NonPositiveDuration,

    #[error("Category name must not be empty")]
    EmptyCategoryName,

    #[error("A category must be selected")]
    MissingCategory,

    #[error("Category '{0}' does not exist")]
    UnknownCategory(String),
}

/// Failures of the key-value persistence layer.
///
/// The store logs these and keeps its in-memory state as the source of truth;
/// they never reach the caller of a store operation.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored value for '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type Result<T, E = PersistenceError> = std::result::Result<T, E>;
