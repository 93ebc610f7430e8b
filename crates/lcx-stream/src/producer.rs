use std::num::NonZeroU32;

use lcx_types::{LedgerRange, ShutdownSignal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::accumulator::BatchAccumulator;
use crate::channel::{batch_channel, BatchPublisher, BatchStream, StreamEnd};
use crate::error::{StreamError, StreamResult};
use crate::source::ChangeSource;

/// Spawn the producer task for `range` and return the consumer's end of
/// the stream along with the task handle.
pub fn spawn_change_stream<S>(
    source: S,
    range: LedgerRange,
    batch_size: NonZeroU32,
    shutdown: ShutdownSignal,
) -> (BatchStream, JoinHandle<()>)
where
    S: ChangeSource + 'static,
{
    let (publisher, stream) = batch_channel();
    let handle = tokio::spawn(stream_changes(source, range, batch_size, publisher, shutdown));
    (stream, handle)
}

/// Pull ledgers from `source`, batch them, and publish each completed batch.
///
/// Always finishes the publisher exactly once, whatever the outcome.
pub async fn stream_changes<S: ChangeSource>(
    mut source: S,
    range: LedgerRange,
    batch_size: NonZeroU32,
    publisher: BatchPublisher,
    mut shutdown: ShutdownSignal,
) {
    info!(
        start = range.start(),
        end = ?range.end(),
        batch_size = batch_size.get(),
        "change stream started"
    );

    let end = match pump(&mut source, range, batch_size, &publisher, &mut shutdown).await {
        Ok(end) => end,
        Err(err) => {
            error!(error = %err, "change stream failed");
            StreamEnd::Failed(err)
        }
    };

    info!(end = ?end, "change stream finished");
    publisher.finish(end);
}

async fn pump<S: ChangeSource>(
    source: &mut S,
    range: LedgerRange,
    batch_size: NonZeroU32,
    publisher: &BatchPublisher,
    shutdown: &mut ShutdownSignal,
) -> StreamResult<StreamEnd> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => return Ok(StreamEnd::Shutdown),
        prepared = source.prepare(range) => prepared?,
    }

    let mut accumulator = BatchAccumulator::new(range, batch_size);
    let mut last_ledger = None;

    while let Some(expected) = accumulator.expected_ledger() {
        let next = tokio::select! {
            biased;
            _ = shutdown.triggered() => return Ok(StreamEnd::Shutdown),
            next = source.next_ledger() => next?,
        };
        let Some(ledger) = next else {
            return Err(StreamError::SourceExhausted { expected });
        };
        last_ledger = Some(ledger.sequence);

        if let Some(batch) = accumulator.push(ledger)? {
            debug!(
                start = batch.start_ledger,
                end = batch.end_ledger,
                changes = batch.len(),
                "batch complete"
            );
            if publisher.publish(batch).is_err() {
                info!("consumer closed the change stream");
                return Ok(StreamEnd::Shutdown);
            }
        }
    }

    Ok(StreamEnd::Completed {
        last_ledger: last_ledger.unwrap_or(range.start()),
    })
}
