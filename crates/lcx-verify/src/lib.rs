//! Checkpoint verification for the ledger change exporter.
//!
//! At every checkpoint ledger the network publishes its full state to a
//! history archive. The [`CheckpointVerifier`] pages through that state for
//! each enabled entry type and compares it with the rows the exporter
//! collected for the checkpoint: counts must agree and every key must be
//! accounted for on both sides.

pub mod archive;
pub mod error;
pub mod result;
pub mod verifier;

pub use archive::{ArchivePage, ArchiveSnapshot, HistoryArchive, InMemoryArchive};
pub use error::{ArchiveError, ArchiveResult, VerifyError, VerifyResult};
pub use result::{Divergence, VerificationResult};
pub use verifier::{CheckpointVerifier, VerifierConfig, VERIFY_BATCH_SIZE};
