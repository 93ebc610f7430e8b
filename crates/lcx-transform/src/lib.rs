//! Entry routing for the ledger change exporter.
//!
//! The router walks a [`ChangeBatch`](lcx_types::ChangeBatch), hands each
//! change of an enabled entry type to the matching [`EntryTransformer`]
//! handler, and appends the resulting [`OutputRow`] to the batch's
//! [`TransformedOutput`]. Rows last modified on a checkpoint ledger are also
//! recorded in the run-wide [`CheckpointAggregate`] for later verification.

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod output;
pub mod router;
pub mod transformer;

pub use aggregate::CheckpointAggregate;
pub use error::{TransformError, TransformResult};
pub use filter::EntryFilter;
pub use output::{OutputRow, TransformedOutput};
pub use router::{EntryRouter, RouteReport, RoutedBatch};
pub use transformer::{EntryTransformer, SnapshotTransformer};
