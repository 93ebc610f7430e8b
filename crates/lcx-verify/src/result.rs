use std::collections::BTreeMap;
use std::fmt;

use lcx_types::{EntryKey, EntryType};
use serde::{Deserialize, Serialize};

/// How one entry type disagreed with the archive at a checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub entry_type: EntryType,
    /// Distinct live keys the exporter observed.
    pub observed: usize,
    /// Keys the archive lists.
    pub archived: usize,
    /// In the archive but never observed. Sorted.
    pub missing: Vec<EntryKey>,
    /// Observed but absent from the archive. Sorted.
    pub extra: Vec<EntryKey>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: observed {} archived {}",
            self.entry_type, self.observed, self.archived
        )?;
        if !self.missing.is_empty() {
            write!(f, ", missing [{}]", join(&self.missing))?;
        }
        if !self.extra.is_empty() {
            write!(f, ", extra [{}]", join(&self.extra))?;
        }
        Ok(())
    }
}

fn join(keys: &[EntryKey]) -> String {
    keys.iter()
        .map(EntryKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of verifying one checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResult {
    /// Every verified entry type agreed. `counts` holds the live key count
    /// per verified type.
    Match {
        checkpoint: u32,
        counts: BTreeMap<EntryType, usize>,
    },
    Mismatch {
        checkpoint: u32,
        divergences: Vec<Divergence>,
    },
}

impl VerificationResult {
    pub fn checkpoint(&self) -> u32 {
        match self {
            Self::Match { checkpoint, .. } | Self::Mismatch { checkpoint, .. } => *checkpoint,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match { checkpoint, counts } => {
                let total: usize = counts.values().sum();
                write!(f, "checkpoint {checkpoint} matches ({total} entries)")
            }
            Self::Mismatch {
                checkpoint,
                divergences,
            } => {
                write!(f, "checkpoint {checkpoint} diverges")?;
                for d in divergences {
                    write!(f, "; {d}")?;
                }
                Ok(())
            }
        }
    }
}
