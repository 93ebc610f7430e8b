//! Change streaming for the ledger change exporter.
//!
//! Turns the replay engine's per-ledger change sets into contiguous
//! [`ChangeBatch`](lcx_types::ChangeBatch)es and hands them to a single
//! consumer.
//!
//! - [`ChangeSource`] is the boundary to the external replay engine.
//! - [`BatchAccumulator`] groups ledgers into batches and enforces ordering.
//! - [`batch_channel`] builds the typed producer/consumer boundary: the
//!   [`BatchPublisher`] is the only writer, the [`BatchStream`] the only
//!   reader, and the publisher reports exactly one [`StreamEnd`].
//! - [`spawn_change_stream`] runs the producer task.

pub mod accumulator;
pub mod channel;
pub mod error;
pub mod producer;
pub mod replay;
pub mod source;

pub use accumulator::BatchAccumulator;
pub use channel::{batch_channel, BatchPublisher, BatchStream, StreamEnd, StreamMessage};
pub use error::{StreamError, StreamResult};
pub use producer::{spawn_change_stream, stream_changes};
pub use replay::{ChannelChangeSource, ReplayChangeSource};
pub use source::ChangeSource;
