use std::collections::BTreeMap;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::change::LedgerChange;
use crate::checkpoint::CheckpointSchedule;
use crate::entry::EntryType;
use crate::error::TypeError;

/// The ledgers an export covers.
///
/// `end == None` means unbounded: keep exporting as the network closes new
/// ledgers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerRange {
    start: u32,
    end: Option<u32>,
}

impl LedgerRange {
    /// A closed range `[start, end]`.
    pub fn bounded(start: u32, end: u32) -> Result<Self, TypeError> {
        if start == 0 {
            return Err(TypeError::ZeroStartLedger);
        }
        if end < start {
            return Err(TypeError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// An open range starting at `start`.
    pub fn unbounded(start: u32) -> Result<Self, TypeError> {
        if start == 0 {
            return Err(TypeError::ZeroStartLedger);
        }
        Ok(Self { start, end: None })
    }

    /// Build from the conventional `(start, end)` pair where `end == 0`
    /// requests an unbounded export.
    pub fn from_bounds(start: u32, end_or_zero: u32) -> Result<Self, TypeError> {
        if end_or_zero == 0 {
            Self::unbounded(start)
        } else {
            Self::bounded(start, end_or_zero)
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> Option<u32> {
        self.end
    }

    pub fn is_bounded(&self) -> bool {
        self.end.is_some()
    }

    pub fn contains(&self, seq: u32) -> bool {
        seq >= self.start && self.end.map_or(true, |end| seq <= end)
    }

    /// Last ledger of the batch that begins at `batch_start`.
    ///
    /// Batches are `batch_size` ledgers long except the final one of a
    /// bounded range, which is clipped to the range end.
    pub fn batch_end(&self, batch_start: u32, batch_size: NonZeroU32) -> u32 {
        let natural = batch_start.saturating_add(batch_size.get() - 1);
        match self.end {
            Some(end) => natural.min(end),
            None => natural,
        }
    }

    /// Iterate the `(start, end)` bounds of every batch in the range.
    pub fn batches(&self, batch_size: NonZeroU32) -> BatchBounds {
        BatchBounds {
            range: *self,
            batch_size,
            next_start: Some(self.start),
        }
    }
}

/// Iterator over consecutive batch bounds of a [`LedgerRange`].
#[derive(Clone, Debug)]
pub struct BatchBounds {
    range: LedgerRange,
    batch_size: NonZeroU32,
    next_start: Option<u32>,
}

impl Iterator for BatchBounds {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        if !self.range.contains(start) {
            self.next_start = None;
            return None;
        }
        let end = self.range.batch_end(start, self.batch_size);
        self.next_start = end.checked_add(1);
        Some((start, end))
    }
}

/// A contiguous range of ledgers whose changes are exported as one unit.
///
/// Invariant: every contained change was last modified inside
/// `[start_ledger, end_ledger]`. Changes are grouped by entry type and keep
/// their arrival order within each type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub start_ledger: u32,
    pub end_ledger: u32,
    changes: BTreeMap<EntryType, Vec<LedgerChange>>,
}

impl ChangeBatch {
    pub fn new(start_ledger: u32, end_ledger: u32) -> Result<Self, TypeError> {
        if end_ledger < start_ledger {
            return Err(TypeError::InvalidRange {
                start: start_ledger,
                end: end_ledger,
            });
        }
        Ok(Self {
            start_ledger,
            end_ledger,
            changes: BTreeMap::new(),
        })
    }

    /// Append a change, enforcing the batch range invariant.
    pub fn push(&mut self, change: LedgerChange) -> Result<(), TypeError> {
        if !self.contains_ledger(change.last_modified_ledger_seq) {
            return Err(TypeError::ChangeOutsideBatch {
                key: change.key.to_string(),
                seq: change.last_modified_ledger_seq,
                start: self.start_ledger,
                end: self.end_ledger,
            });
        }
        self.changes.entry(change.entry_type).or_default().push(change);
        Ok(())
    }

    /// Changes of one entry type, in arrival order.
    pub fn changes(&self, entry_type: EntryType) -> &[LedgerChange] {
        self.changes.get(&entry_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entry types with at least one change, with their changes.
    pub fn iter(&self) -> impl Iterator<Item = (EntryType, &[LedgerChange])> {
        self.changes.iter().map(|(t, c)| (*t, c.as_slice()))
    }

    /// Total number of changes across all entry types.
    pub fn len(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ledger_count(&self) -> u32 {
        self.end_ledger - self.start_ledger + 1
    }

    pub fn contains_ledger(&self, seq: u32) -> bool {
        seq >= self.start_ledger && seq <= self.end_ledger
    }

    /// Checkpoint ledgers that fall inside this batch.
    pub fn checkpoints(&self, schedule: &CheckpointSchedule) -> Vec<u32> {
        schedule
            .checkpoints_in(self.start_ledger, self.end_ledger)
            .collect()
    }
}
