//! Foundation types for the ledger change exporter (LCX).
//!
//! This crate provides the vocabulary shared by every other LCX crate: what a
//! ledger entry change looks like, how changes are grouped into batches, and
//! which ledgers are checkpoints.
//!
//! # Key Types
//!
//! - [`EntryType`]: closed set of ledger entry categories
//! - [`EntryKey`]: stable identity of one ledger entry
//! - [`LedgerChange`]: before/after delta for one entry during one ledger
//! - [`LedgerChanges`]: every change observed while closing one ledger
//! - [`ChangeBatch`]: contiguous range of ledgers grouped by entry type
//! - [`LedgerRange`]: requested export range, bounded or unbounded
//! - [`CheckpointSchedule`]: the periodic checkpoint rule
//! - [`ShutdownSignal`]: cooperative shutdown/cancellation flag

pub mod batch;
pub mod change;
pub mod checkpoint;
pub mod entry;
pub mod error;
pub mod signal;

pub use batch::{BatchBounds, ChangeBatch, LedgerRange};
pub use change::{ChangeKind, LedgerChange, LedgerChanges};
pub use checkpoint::{is_checkpoint, CheckpointSchedule, CHECKPOINT_FREQUENCY};
pub use entry::{EntryKey, EntryType};
pub use error::TypeError;
pub use signal::{shutdown_channel, ShutdownHandle, ShutdownSignal};
