use std::collections::BTreeMap;

use crate::output::{OutputRow, TransformedOutput};

/// Rows recorded per checkpoint ledger, awaiting verification.
///
/// Owned by the export driver for the whole run and written only by the
/// router. Entries leave the map through [`Self::take`] when their
/// checkpoint is verified, which bounds memory to the checkpoints still in
/// flight.
#[derive(Debug, Default)]
pub struct CheckpointAggregate {
    outputs: BTreeMap<u32, TransformedOutput>,
}

impl CheckpointAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row collected for `checkpoint`.
    pub fn record(&mut self, checkpoint: u32, row: OutputRow) {
        self.outputs.entry(checkpoint).or_default().push(row);
    }

    pub fn get(&self, checkpoint: u32) -> Option<&TransformedOutput> {
        self.outputs.get(&checkpoint)
    }

    /// Remove and return the rows for `checkpoint`.
    pub fn take(&mut self, checkpoint: u32) -> Option<TransformedOutput> {
        self.outputs.remove(&checkpoint)
    }

    /// Checkpoints at or below `ledger`, ascending. Once every ledger up to
    /// `ledger` has been routed, these have been fully observed.
    pub fn ready(&self, ledger: u32) -> Vec<u32> {
        self.outputs.range(..=ledger).map(|(cp, _)| *cp).collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcx_types::{EntryKey, EntryType};

    fn row(key: &str, seq: u32) -> OutputRow {
        OutputRow {
            entry_type: EntryType::Offer,
            key: EntryKey::new(key),
            ledger_seq: seq,
            removed: false,
            fields: serde_json::Value::Null,
        }
    }

    #[test]
    fn rows_accumulate_per_checkpoint() {
        let mut agg = CheckpointAggregate::new();
        agg.record(191, row("o1", 191));
        agg.record(191, row("o2", 191));
        agg.record(255, row("o3", 255));

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get(191).unwrap().offers.len(), 2);
        assert_eq!(agg.ready(u32::MAX), vec![191, 255]);
    }

    #[test]
    fn ready_lists_observed_checkpoints_in_order() {
        let mut agg = CheckpointAggregate::new();
        agg.record(319, row("a", 319));
        agg.record(127, row("b", 127));
        agg.record(191, row("c", 191));

        assert_eq!(agg.ready(200), vec![127, 191]);
        assert_eq!(agg.ready(100), Vec::<u32>::new());
    }

    #[test]
    fn take_evicts() {
        let mut agg = CheckpointAggregate::new();
        agg.record(63, row("a", 63));
        assert!(agg.take(63).is_some());
        assert!(agg.get(63).is_none());
        assert!(agg.take(63).is_none());
        assert!(agg.is_empty());
    }
}
