use lcx_types::{ChangeBatch, CheckpointSchedule};
use tracing::{debug, warn};

use crate::aggregate::CheckpointAggregate;
use crate::filter::EntryFilter;
use crate::output::TransformedOutput;
use crate::transformer::{dispatch, EntryTransformer};

/// Tally of one routing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteReport {
    /// Changes transformed into rows.
    pub routed: usize,
    /// Changes whose transform failed and were skipped.
    pub failed: usize,
    /// Changes of disabled entry types.
    pub skipped: usize,
    /// Rows also recorded for checkpoint verification.
    pub checkpoint_rows: usize,
}

/// The rows of one batch plus how routing went.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutedBatch {
    pub output: TransformedOutput,
    pub report: RouteReport,
}

/// Dispatches each change of a batch to its transform handler.
pub struct EntryRouter {
    transformer: Box<dyn EntryTransformer>,
    filter: EntryFilter,
    schedule: CheckpointSchedule,
}

impl EntryRouter {
    pub fn new(
        transformer: Box<dyn EntryTransformer>,
        filter: EntryFilter,
        schedule: CheckpointSchedule,
    ) -> Self {
        Self {
            transformer,
            filter,
            schedule,
        }
    }

    pub fn filter(&self) -> &EntryFilter {
        &self.filter
    }

    pub fn schedule(&self) -> &CheckpointSchedule {
        &self.schedule
    }

    /// Route every change in `batch`.
    ///
    /// Transform failures are logged and skipped; they never abort the
    /// batch. Rows last modified on a checkpoint ledger are appended to
    /// `aggregate` as well as to the batch output.
    pub fn route(&self, batch: &ChangeBatch, aggregate: &mut CheckpointAggregate) -> RoutedBatch {
        let mut routed = RoutedBatch::default();

        for (entry_type, changes) in batch.iter() {
            if !self.filter.is_enabled(entry_type) {
                routed.report.skipped += changes.len();
                continue;
            }

            for change in changes {
                let row = match dispatch(self.transformer.as_ref(), change) {
                    Ok(row) => row,
                    Err(err) => {
                        warn!(
                            ledger = change.last_modified_ledger_seq,
                            entry_type = %entry_type,
                            key = %change.key,
                            error = %err,
                            "failed to transform entry; skipping"
                        );
                        routed.report.failed += 1;
                        continue;
                    }
                };

                let seq = change.last_modified_ledger_seq;
                if self.schedule.is_checkpoint(seq) {
                    aggregate.record(seq, row.clone());
                    routed.report.checkpoint_rows += 1;
                }
                routed.output.rows_mut(entry_type).push(row);
                routed.report.routed += 1;
            }
        }

        debug!(
            start = batch.start_ledger,
            end = batch.end_ledger,
            routed = routed.report.routed,
            failed = routed.report.failed,
            skipped = routed.report.skipped,
            checkpoint_rows = routed.report.checkpoint_rows,
            "batch routed"
        );
        routed
    }
}
