use lcx_types::EntryType;
use thiserror::Error;

/// Failure to turn one change into an output row. Always recoverable: the
/// router logs it and moves on to the next change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("{entry_type} change for {key} carries neither a pre nor a post state")]
    MissingState { entry_type: EntryType, key: String },

    #[error("invalid {entry_type} entry {key}: {reason}")]
    InvalidEntry {
        entry_type: EntryType,
        key: String,
        reason: String,
    },

    #[error("transform failed: {0}")]
    Failed(String),
}

pub type TransformResult<T> = Result<T, TransformError>;
