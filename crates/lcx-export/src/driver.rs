use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::sync::Arc;

use lcx_stream::{spawn_change_stream, BatchStream, ChangeSource, StreamEnd, StreamMessage};
use lcx_transform::{CheckpointAggregate, EntryRouter, EntryTransformer, TransformedOutput};
use lcx_types::{shutdown_channel, ChangeBatch, LedgerRange, ShutdownSignal};
use lcx_verify::{CheckpointVerifier, HistoryArchive, VerificationResult, VerifyError};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::state::DriverState;

/// What the driver hands to downstream consumers, in stream order.
///
/// A batch is published only after every checkpoint ledger it contains has
/// been verified, and its `Verified` events follow it. When a checkpoint
/// diverges, the outcomes for that batch are published but the batch is
/// not.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    /// A routed batch and the rows produced from it.
    Batch {
        batch: ChangeBatch,
        output: TransformedOutput,
    },
    /// Outcome of verifying one checkpoint.
    Verified(VerificationResult),
}

/// Receiving end of a driver's event stream.
pub type ExportEvents = mpsc::UnboundedReceiver<ExportEvent>;

/// Totals for a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub batches: u64,
    pub ledgers: u64,
    pub rows: u64,
    pub transform_failures: u64,
    pub skipped_changes: u64,
    pub checkpoints_verified: u64,
    /// Last ledger of the last routed batch.
    pub last_ledger: Option<u32>,
    pub final_state: DriverState,
}

/// Runs one export from a change source through routing and checkpoint
/// verification.
///
/// A driver is single-use: [`Self::run`] consumes it.
pub struct ExportDriver<S> {
    source: S,
    range: LedgerRange,
    batch_size: NonZeroU32,
    pipeline: Pipeline,
}

/// Everything the consumer side owns while batches are flowing.
struct Pipeline {
    router: EntryRouter,
    verifier: CheckpointVerifier,
    aggregate: CheckpointAggregate,
    events: mpsc::UnboundedSender<ExportEvent>,
    state: DriverState,
    summary: ExportSummary,
}

impl<S> ExportDriver<S>
where
    S: ChangeSource + 'static,
{
    /// Validate `config` and assemble a driver. Configuration faults are
    /// reported here, before anything is streamed.
    pub fn new(
        config: ExportConfig,
        source: S,
        transformer: Box<dyn EntryTransformer>,
        archive: Arc<dyn HistoryArchive>,
    ) -> ExportResult<(Self, ExportEvents)> {
        config.validate()?;
        let schedule = config.schedule()?;
        let (events, rx) = mpsc::unbounded_channel();

        let driver = Self {
            source,
            range: config.range()?,
            batch_size: config.batch_size()?,
            pipeline: Pipeline {
                router: EntryRouter::new(transformer, config.export, schedule),
                verifier: CheckpointVerifier::new(archive, config.verifier_config()?),
                aggregate: CheckpointAggregate::new(),
                events,
                state: DriverState::Starting,
                summary: ExportSummary::default(),
            },
        };
        Ok((driver, rx))
    }

    /// Stream, route and verify until the range is exhausted, `shutdown`
    /// fires, or a fatal fault occurs.
    ///
    /// Batches delivered before a completed range is reported are still
    /// processed. Once shutdown fires no further batch is accepted.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> ExportResult<ExportSummary> {
        let Self {
            source,
            range,
            batch_size,
            mut pipeline,
        } = self;

        info!(
            start = range.start(),
            end = ?range.end(),
            batch_size = batch_size.get(),
            entry_types = ?pipeline.router.filter().enabled(),
            "export starting"
        );

        let (stopper, producer_signal) = shutdown_channel();
        let (mut stream, producer) = spawn_change_stream(source, range, batch_size, producer_signal);
        pipeline.transition(DriverState::Streaming);

        let outcome = pipeline.consume(&mut stream, &mut shutdown).await;

        pipeline.transition(DriverState::Draining);
        stopper.trigger();
        stream.close();
        if let Err(err) = producer.await {
            warn!(error = %err, "change stream task did not finish cleanly");
        }
        pipeline.transition(DriverState::Stopped);

        match outcome {
            Ok(()) => {
                let summary = pipeline.into_summary();
                info!(
                    batches = summary.batches,
                    ledgers = summary.ledgers,
                    rows = summary.rows,
                    transform_failures = summary.transform_failures,
                    checkpoints_verified = summary.checkpoints_verified,
                    "export finished"
                );
                Ok(summary)
            }
            Err(err) => {
                error!(error = %err, "export aborted");
                Err(err)
            }
        }
    }
}

impl Pipeline {
    fn transition(&mut self, next: DriverState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal driver transition {} -> {}",
            self.state,
            next
        );
        match (self.state, next) {
            // Per-batch cycle.
            (_, DriverState::Routing | DriverState::Verifying)
            | (DriverState::Routing | DriverState::Verifying, DriverState::Streaming) => {
                debug!(from = %self.state, to = %next, "driver state");
            }
            _ => info!(from = %self.state, to = %next, "driver state"),
        }
        self.state = next;
    }

    async fn consume(
        &mut self,
        stream: &mut BatchStream,
        shutdown: &mut ShutdownSignal,
    ) -> ExportResult<()> {
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    info!("shutdown requested; no further batches accepted");
                    return Ok(());
                }
                message = stream.recv() => message,
            };

            match message {
                StreamMessage::Batch(batch) => match self.process(batch, shutdown).await {
                    Ok(()) => {}
                    Err(ExportError::Verification(VerifyError::Cancelled(checkpoint))) => {
                        info!(checkpoint, "verification cancelled by shutdown");
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                },
                StreamMessage::End(StreamEnd::Completed { last_ledger }) => {
                    info!(last_ledger, "ledger range exhausted");
                    return Ok(());
                }
                StreamMessage::End(StreamEnd::Shutdown) => return Ok(()),
                StreamMessage::End(StreamEnd::Failed(err)) => return Err(err.into()),
            }
        }
    }

    async fn process(&mut self, batch: ChangeBatch, cancel: &ShutdownSignal) -> ExportResult<()> {
        self.transition(DriverState::Routing);
        let routed = self.router.route(&batch, &mut self.aggregate);

        self.summary.batches += 1;
        self.summary.ledgers += u64::from(batch.ledger_count());
        self.summary.rows += routed.report.routed as u64;
        self.summary.transform_failures += routed.report.failed as u64;
        self.summary.skipped_changes += routed.report.skipped as u64;
        self.summary.last_ledger = Some(batch.end_ledger);

        let checkpoints: BTreeSet<u32> = batch
            .checkpoints(self.router.schedule())
            .into_iter()
            .chain(self.aggregate.ready(batch.end_ledger))
            .collect();

        let mut verified = Vec::with_capacity(checkpoints.len());
        if !checkpoints.is_empty() {
            self.transition(DriverState::Verifying);
            for checkpoint in checkpoints {
                let result = self
                    .verifier
                    .verify_and_evict(&mut self.aggregate, checkpoint, cancel)
                    .await?;
                self.summary.checkpoints_verified += 1;

                if let VerificationResult::Mismatch {
                    checkpoint,
                    divergences,
                } = &result
                {
                    // The failing batch itself is never published.
                    let err = ExportError::CheckpointMismatch {
                        checkpoint: *checkpoint,
                        divergences: divergences.clone(),
                    };
                    for event in verified {
                        self.emit(event);
                    }
                    self.emit(ExportEvent::Verified(result));
                    return Err(err);
                }
                verified.push(ExportEvent::Verified(result));
            }
        }

        self.emit(ExportEvent::Batch {
            batch,
            output: routed.output,
        });
        for event in verified {
            self.emit(event);
        }

        self.transition(DriverState::Streaming);
        Ok(())
    }

    fn emit(&self, event: ExportEvent) {
        // Listeners are optional.
        let _ = self.events.send(event);
    }

    fn into_summary(self) -> ExportSummary {
        ExportSummary {
            final_state: self.state,
            ..self.summary
        }
    }
}
