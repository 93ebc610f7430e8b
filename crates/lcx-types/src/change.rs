use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::{EntryKey, EntryType};

/// How an entry's state moved during one ledger close.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

/// One observed mutation to a single ledger entry.
///
/// The `pre`/`post` states are opaque to the exporter: they are produced by
/// the replay engine and interpreted only by the transform step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerChange {
    pub entry_type: EntryType,
    pub key: EntryKey,
    /// Ledger in which the mutation was committed.
    pub last_modified_ledger_seq: u32,
    #[serde(default)]
    pub pre: Option<Value>,
    #[serde(default)]
    pub post: Option<Value>,
}

impl LedgerChange {
    /// Classify the change from its before/after states.
    ///
    /// Returns `None` when neither state is present, which no well-formed
    /// replay engine produces.
    pub fn kind(&self) -> Option<ChangeKind> {
        match (&self.pre, &self.post) {
            (None, Some(_)) => Some(ChangeKind::Created),
            (Some(_), Some(_)) => Some(ChangeKind::Updated),
            (Some(_), None) => Some(ChangeKind::Removed),
            (None, None) => None,
        }
    }

    /// The entry state after the change, or before it for removals.
    pub fn current_state(&self) -> Option<&Value> {
        self.post.as_ref().or(self.pre.as_ref())
    }

    pub fn is_removal(&self) -> bool {
        self.kind() == Some(ChangeKind::Removed)
    }
}

/// Every change the replay engine observed while closing one ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerChanges {
    pub sequence: u32,
    #[serde(default)]
    pub changes: Vec<LedgerChange>,
}

impl LedgerChanges {
    pub fn new(sequence: u32, changes: Vec<LedgerChange>) -> Self {
        Self { sequence, changes }
    }

    /// A ledger that closed without touching any tracked entry.
    pub fn empty(sequence: u32) -> Self {
        Self::new(sequence, Vec::new())
    }
}
