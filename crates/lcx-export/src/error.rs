use lcx_stream::StreamError;
use lcx_verify::{Divergence, VerifyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("change stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("verification error: {0}")]
    Verification(#[from] VerifyError),

    #[error("checkpoint {checkpoint} diverges from the archive in {} entry type(s)", divergences.len())]
    CheckpointMismatch {
        checkpoint: u32,
        divergences: Vec<Divergence>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
