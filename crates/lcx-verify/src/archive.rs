use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use lcx_types::{EntryKey, EntryType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};

/// One page of entry keys from a checkpoint snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePage {
    pub keys: Vec<EntryKey>,
    /// Cursor for the following page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Read access to the state snapshots a history archive publishes at each
/// checkpoint ledger.
///
/// Entries are returned one page at a time so that a verifier never has to
/// hold a full snapshot in memory. Passing `None` as the cursor starts from
/// the first page.
#[async_trait]
pub trait HistoryArchive: Send + Sync {
    async fn fetch_entries(
        &self,
        checkpoint: u32,
        entry_type: EntryType,
        cursor: Option<&str>,
        limit: usize,
    ) -> ArchiveResult<ArchivePage>;
}

/// Serialized form of one checkpoint snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    pub checkpoint: u32,
    #[serde(default)]
    pub entries: BTreeMap<EntryType, Vec<EntryKey>>,
}

type SnapshotMap = HashMap<u32, BTreeMap<EntryType, Vec<EntryKey>>>;

/// Archive held entirely in memory. Cursors are decimal offsets into the
/// stored key list.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    snapshots: RwLock<SnapshotMap>,
    requests: AtomicUsize,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots(snapshots: impl IntoIterator<Item = ArchiveSnapshot>) -> Self {
        let map = snapshots
            .into_iter()
            .map(|s| (s.checkpoint, s.entries))
            .collect();
        Self {
            snapshots: RwLock::new(map),
            requests: AtomicUsize::new(0),
        }
    }

    /// Load a JSON array of [`ArchiveSnapshot`]s.
    pub fn load(path: &Path) -> ArchiveResult<Self> {
        let raw = fs::read_to_string(path)?;
        let snapshots: Vec<ArchiveSnapshot> =
            serde_json::from_str(&raw).map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        debug!(path = %path.display(), checkpoints = snapshots.len(), "archive loaded");
        Ok(Self::from_snapshots(snapshots))
    }

    /// Publish `keys` as the `entry_type` state of `checkpoint`, replacing
    /// whatever was there.
    pub fn insert(
        &self,
        checkpoint: u32,
        entry_type: EntryType,
        keys: impl IntoIterator<Item = EntryKey>,
    ) -> ArchiveResult<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| ArchiveError::LockPoisoned)?;
        snapshots
            .entry(checkpoint)
            .or_default()
            .insert(entry_type, keys.into_iter().collect());
        Ok(())
    }

    /// Number of `fetch_entries` calls served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

fn parse_cursor(cursor: Option<&str>) -> ArchiveResult<usize> {
    match cursor {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| ArchiveError::InvalidCursor(raw.to_string())),
    }
}

#[async_trait]
impl HistoryArchive for InMemoryArchive {
    async fn fetch_entries(
        &self,
        checkpoint: u32,
        entry_type: EntryType,
        cursor: Option<&str>,
        limit: usize,
    ) -> ArchiveResult<ArchivePage> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let offset = parse_cursor(cursor)?;

        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| ArchiveError::LockPoisoned)?;
        let snapshot = snapshots
            .get(&checkpoint)
            .ok_or(ArchiveError::CheckpointNotFound(checkpoint))?;
        let keys = snapshot
            .get(&entry_type)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if offset > keys.len() {
            return Err(ArchiveError::InvalidCursor(offset.to_string()));
        }
        let end = offset.saturating_add(limit.max(1)).min(keys.len());
        let next_cursor = (end < keys.len()).then(|| end.to_string());

        Ok(ArchivePage {
            keys: keys[offset..end].to_vec(),
            next_cursor,
        })
    }
}
