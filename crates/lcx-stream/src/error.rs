use lcx_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("ledger {found} arrived out of order; expected {expected}")]
    OutOfOrder { expected: u32, found: u32 },

    #[error("ledger {seq} is beyond the requested end ledger {end}")]
    BeyondRange { seq: u32, end: u32 },

    #[error("change to {key} reports ledger {reported} but arrived in ledger {ledger}")]
    ChangeOutsideLedger {
        ledger: u32,
        key: String,
        reported: u32,
    },

    #[error("change source ran dry while ledger {expected} was still expected")]
    SourceExhausted { expected: u32 },

    #[error("change source failed: {0}")]
    Source(String),

    #[error("malformed change record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("change stream producer went away without reporting an end")]
    Disconnected,

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;
