use std::num::NonZeroU32;

use lcx_types::{ChangeBatch, LedgerChanges, LedgerRange};

use crate::error::{StreamError, StreamResult};

/// Groups consecutive ledgers into [`ChangeBatch`]es of a fixed size.
///
/// A batch is released only once every ledger in its range has been pushed.
/// Ledgers must arrive exactly in sequence starting at the range start;
/// anything else is an integrity fault and the accumulator must be
/// discarded.
#[derive(Debug)]
pub struct BatchAccumulator {
    range: LedgerRange,
    batch_size: NonZeroU32,
    current: Option<ChangeBatch>,
    next_ledger: Option<u32>,
}

impl BatchAccumulator {
    pub fn new(range: LedgerRange, batch_size: NonZeroU32) -> Self {
        Self {
            range,
            batch_size,
            current: None,
            next_ledger: Some(range.start()),
        }
    }

    /// The ledger the accumulator expects next, or `None` once a bounded
    /// range has been fully observed.
    pub fn expected_ledger(&self) -> Option<u32> {
        self.next_ledger
    }

    /// Record one ledger. Returns the batch it completes, if any.
    pub fn push(&mut self, ledger: LedgerChanges) -> StreamResult<Option<ChangeBatch>> {
        let seq = ledger.sequence;
        let expected = match self.next_ledger {
            Some(expected) => expected,
            None => {
                return Err(StreamError::BeyondRange {
                    seq,
                    end: self.range.end().unwrap_or(u32::MAX),
                })
            }
        };
        if seq != expected {
            return Err(StreamError::OutOfOrder {
                expected,
                found: seq,
            });
        }
        if let Some(stray) = ledger
            .changes
            .iter()
            .find(|c| c.last_modified_ledger_seq != seq)
        {
            return Err(StreamError::ChangeOutsideLedger {
                ledger: seq,
                key: stray.key.to_string(),
                reported: stray.last_modified_ledger_seq,
            });
        }

        let mut batch = match self.current.take() {
            Some(batch) => batch,
            None => ChangeBatch::new(seq, self.range.batch_end(seq, self.batch_size))?,
        };
        for change in ledger.changes {
            batch.push(change)?;
        }

        self.next_ledger = match self.range.end() {
            Some(end) if seq == end => None,
            _ => seq.checked_add(1),
        };

        if seq == batch.end_ledger {
            Ok(Some(batch))
        } else {
            self.current = Some(batch);
            Ok(None)
        }
    }
}
