use thiserror::Error;

/// Errors produced by type construction and invariant checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid ledger range: start={start}, end={end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("start ledger must be greater than 0")]
    ZeroStartLedger,

    #[error("checkpoint frequency must be greater than 0")]
    ZeroCheckpointFrequency,

    #[error("change for {key} last modified at ledger {seq}, outside batch [{start}, {end}]")]
    ChangeOutsideBatch {
        key: String,
        seq: u32,
        start: u32,
        end: u32,
    },

    #[error("unknown entry type: {0}")]
    UnknownEntryType(String),
}
