//! Export driver for ledger change streams.
//!
//! [`ExportDriver`] ties the pipeline together: it validates an
//! [`ExportConfig`], spawns the change stream, routes each delivered batch,
//! verifies every checkpoint as soon as it has been fully observed, and
//! publishes batches and verification outcomes as [`ExportEvent`]s.
//! Divergence from archived checkpoint state is fatal to the run.

pub mod config;
pub mod driver;
pub mod error;
pub mod state;

pub use config::ExportConfig;
pub use driver::{ExportDriver, ExportEvent, ExportEvents, ExportSummary};
pub use error::{ExportError, ExportResult};
pub use state::DriverState;
