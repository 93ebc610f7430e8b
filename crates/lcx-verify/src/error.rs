use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no snapshot published for checkpoint {0}")]
    CheckpointNotFound(u32),

    #[error("invalid page cursor: {0}")]
    InvalidCursor(String),

    #[error("archive request failed: {0}")]
    Request(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("archive state lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("ledger {0} is not a checkpoint ledger")]
    NotACheckpoint(u32),

    #[error("verification of checkpoint {0} was cancelled")]
    Cancelled(u32),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
