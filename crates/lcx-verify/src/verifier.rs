use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lcx_transform::{CheckpointAggregate, EntryFilter, OutputRow, TransformedOutput};
use lcx_types::{CheckpointSchedule, EntryKey, EntryType, ShutdownSignal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::HistoryArchive;
use crate::error::{ArchiveError, VerifyError, VerifyResult};
use crate::result::{Divergence, VerificationResult};

/// Default number of archive entries requested per page.
pub const VERIFY_BATCH_SIZE: usize = 50_000;

/// Verifier settings. `filter` and `schedule` must match the ones the
/// router ran with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub page_size: usize,
    pub filter: EntryFilter,
    pub schedule: CheckpointSchedule,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            page_size: VERIFY_BATCH_SIZE,
            filter: EntryFilter::default(),
            schedule: CheckpointSchedule::default(),
        }
    }
}

/// Compares collected checkpoint rows against archived checkpoint state.
pub struct CheckpointVerifier {
    archive: Arc<dyn HistoryArchive>,
    config: VerifierConfig,
}

/// Outcome of comparing a single entry type.
struct TypeCheck {
    live: usize,
    divergence: Option<Divergence>,
}

impl CheckpointVerifier {
    pub fn new(archive: Arc<dyn HistoryArchive>, config: VerifierConfig) -> Self {
        Self { archive, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify the rows `observed` for `checkpoint` against the archive.
    ///
    /// Only entry types enabled by the filter are compared. Removal rows do
    /// not count as live, and a key seen several times counts once with its
    /// latest row deciding liveness. Pending archive requests are abandoned
    /// as soon as `cancel` fires.
    pub async fn verify(
        &self,
        checkpoint: u32,
        observed: &TransformedOutput,
        cancel: &ShutdownSignal,
    ) -> VerifyResult<VerificationResult> {
        if !self.config.schedule.is_checkpoint(checkpoint) {
            return Err(VerifyError::NotACheckpoint(checkpoint));
        }

        let mut counts = BTreeMap::new();
        let mut divergences = Vec::new();
        for entry_type in self.config.filter.enabled() {
            let check = self
                .check_type(checkpoint, entry_type, observed.rows(entry_type), cancel)
                .await?;
            counts.insert(entry_type, check.live);
            divergences.extend(check.divergence);
        }

        Ok(if divergences.is_empty() {
            VerificationResult::Match { checkpoint, counts }
        } else {
            VerificationResult::Mismatch {
                checkpoint,
                divergences,
            }
        })
    }

    /// Remove `checkpoint` from `aggregate` and verify its rows.
    ///
    /// The entry is evicted whatever the outcome, including on error.
    pub async fn verify_and_evict(
        &self,
        aggregate: &mut CheckpointAggregate,
        checkpoint: u32,
        cancel: &ShutdownSignal,
    ) -> VerifyResult<VerificationResult> {
        let observed = aggregate.take(checkpoint).unwrap_or_default();
        let result = self.verify(checkpoint, &observed, cancel).await?;
        match &result {
            VerificationResult::Match { counts, .. } => {
                info!(checkpoint, entries = counts.values().sum::<usize>(), "checkpoint verified");
            }
            VerificationResult::Mismatch { divergences, .. } => {
                for d in divergences {
                    warn!(
                        checkpoint,
                        entry_type = %d.entry_type,
                        observed = d.observed,
                        archived = d.archived,
                        missing = d.missing.len(),
                        extra = d.extra.len(),
                        "checkpoint state diverges from archive"
                    );
                }
            }
        }
        Ok(result)
    }

    async fn check_type(
        &self,
        checkpoint: u32,
        entry_type: EntryType,
        rows: &[OutputRow],
        cancel: &ShutdownSignal,
    ) -> VerifyResult<TypeCheck> {
        let mut latest: HashMap<&EntryKey, bool> = HashMap::with_capacity(rows.len());
        for row in rows {
            latest.insert(&row.key, row.is_live());
        }
        let mut unmatched: HashSet<&EntryKey> = latest
            .into_iter()
            .filter_map(|(key, live)| live.then_some(key))
            .collect();
        let live = unmatched.len();

        // Archive keys are compared by identity; a key listed twice counts once.
        let mut matched: HashSet<&EntryKey> = HashSet::with_capacity(live);
        let mut duplicates = 0usize;
        let mut missing = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let mut cancel = cancel.clone();
            let page = tokio::select! {
                biased;
                _ = cancel.triggered() => return Err(VerifyError::Cancelled(checkpoint)),
                page = self.archive.fetch_entries(
                    checkpoint,
                    entry_type,
                    cursor.as_deref(),
                    self.config.page_size.max(1),
                ) => page?,
            };
            pages += 1;
            for key in page.keys {
                if let Some(observed) = unmatched.take(&key) {
                    matched.insert(observed);
                } else if matched.contains(&key) {
                    duplicates += 1;
                } else {
                    missing.push(key);
                }
            }

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(ArchiveError::InvalidCursor(next).into());
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        missing.sort();
        let listed = missing.len();
        missing.dedup();
        duplicates += listed - missing.len();
        let archived = matched.len() + missing.len();
        debug!(
            checkpoint,
            entry_type = %entry_type,
            pages,
            archived,
            duplicates,
            live,
            "archive state compared"
        );

        let mut extra: Vec<EntryKey> = unmatched.into_iter().cloned().collect();
        extra.sort();

        let divergence = (archived != live || !missing.is_empty() || !extra.is_empty()).then(|| {
            Divergence {
                entry_type,
                observed: live,
                archived,
                missing,
                extra,
            }
        });
        Ok(TypeCheck { live, divergence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchivePage, InMemoryArchive};
    use crate::error::ArchiveResult;
    use async_trait::async_trait;
    use lcx_types::shutdown_channel;
    use std::time::Duration;

    fn row(entry_type: EntryType, key: &str, seq: u32) -> OutputRow {
        OutputRow {
            entry_type,
            key: EntryKey::new(key),
            ledger_seq: seq,
            removed: false,
            fields: serde_json::Value::Null,
        }
    }

    fn keys(names: &[&str]) -> Vec<EntryKey> {
        names.iter().map(|n| EntryKey::new(*n)).collect()
    }

    fn verifier(archive: Arc<InMemoryArchive>, config: VerifierConfig) -> CheckpointVerifier {
        CheckpointVerifier::new(archive, config)
    }

    fn offers_only() -> VerifierConfig {
        VerifierConfig {
            filter: EntryFilter::only(&[EntryType::Offer]),
            ..VerifierConfig::default()
        }
    }

    #[tokio::test]
    async fn matching_state_passes() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .insert(191, EntryType::Offer, keys(&["o2", "o1"]))
            .unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 191));
        observed.push(row(EntryType::Offer, "o2", 191));

        let result = verifier(archive, offers_only())
            .verify(191, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        assert_eq!(
            result,
            VerificationResult::Match {
                checkpoint: 191,
                counts: BTreeMap::from([(EntryType::Offer, 2)]),
            }
        );
    }

    #[tokio::test]
    async fn missing_offer_is_reported() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .insert(191, EntryType::Offer, keys(&["o1", "o2", "o3"]))
            .unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 191));
        observed.push(row(EntryType::Offer, "o3", 191));

        let result = verifier(archive, offers_only())
            .verify(191, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        let VerificationResult::Mismatch { divergences, .. } = result else {
            panic!("expected mismatch");
        };
        assert_eq!(divergences.len(), 1);
        assert_eq!(divergences[0].observed, 2);
        assert_eq!(divergences[0].archived, 3);
        assert_eq!(divergences[0].missing, keys(&["o2"]));
        assert!(divergences[0].extra.is_empty());
    }

    #[tokio::test]
    async fn extra_keys_are_reported() {
        let archive = Arc::new(InMemoryArchive::new());
        archive.insert(63, EntryType::Offer, keys(&["o1"])).unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 63));
        observed.push(row(EntryType::Offer, "o9", 63));

        let result = verifier(archive, offers_only())
            .verify(63, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        let VerificationResult::Mismatch { divergences, .. } = result else {
            panic!("expected mismatch");
        };
        assert_eq!(divergences[0].extra, keys(&["o9"]));
        assert!(divergences[0].missing.is_empty());
    }

    #[tokio::test]
    async fn removals_and_repeats_collapse_to_live_keys() {
        let archive = Arc::new(InMemoryArchive::new());
        archive.insert(127, EntryType::Offer, keys(&["o1"])).unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 127));
        observed.push(row(EntryType::Offer, "o1", 127));
        let mut gone = row(EntryType::Offer, "o2", 127);
        gone.removed = true;
        observed.push(gone);

        let result = verifier(archive, offers_only())
            .verify(127, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        assert!(result.is_match());
    }

    #[tokio::test]
    async fn repeated_archive_keys_count_once() {
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .insert(191, EntryType::Offer, keys(&["o1", "o2", "o1", "o2", "o2"]))
            .unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 191));

        let config = VerifierConfig {
            page_size: 2,
            ..offers_only()
        };
        let result = verifier(archive, config)
            .verify(191, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        let VerificationResult::Mismatch { divergences, .. } = result else {
            panic!("expected mismatch");
        };
        assert_eq!(divergences[0].observed, 1);
        assert_eq!(divergences[0].archived, 2);
        assert_eq!(divergences[0].missing, keys(&["o2"]));
    }

    #[tokio::test]
    async fn repeated_archive_key_that_was_observed_matches() {
        let archive = Arc::new(InMemoryArchive::new());
        archive.insert(191, EntryType::Offer, keys(&["o1", "o1"])).unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 191));

        let result = verifier(archive, offers_only())
            .verify(191, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        assert!(result.is_match());
    }

    #[tokio::test]
    async fn paginates_large_snapshots() {
        let names: Vec<String> = (0..25).map(|i| format!("acct:{i:02}")).collect();
        let archive = Arc::new(InMemoryArchive::new());
        archive
            .insert(
                255,
                EntryType::Account,
                names.iter().map(|n| EntryKey::new(n.as_str())),
            )
            .unwrap();

        let mut observed = TransformedOutput::default();
        for name in &names {
            observed.push(row(EntryType::Account, name, 255));
        }

        let config = VerifierConfig {
            page_size: 10,
            filter: EntryFilter::only(&[EntryType::Account]),
            ..VerifierConfig::default()
        };
        let result = verifier(archive.clone(), config)
            .verify(255, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        assert!(result.is_match());
        assert_eq!(archive.request_count(), 3);
    }

    #[tokio::test]
    async fn disabled_types_are_not_fetched() {
        let archive = Arc::new(InMemoryArchive::new());
        archive.insert(63, EntryType::Offer, keys(&["o1"])).unwrap();
        archive
            .insert(63, EntryType::Account, keys(&["a1", "a2"]))
            .unwrap();

        let mut observed = TransformedOutput::default();
        observed.push(row(EntryType::Offer, "o1", 63));

        let result = verifier(archive.clone(), offers_only())
            .verify(63, &observed, &ShutdownSignal::never())
            .await
            .unwrap();
        assert!(result.is_match());
        assert_eq!(archive.request_count(), 1);
    }

    #[tokio::test]
    async fn rejects_non_checkpoint_ledgers() {
        let archive = Arc::new(InMemoryArchive::new());
        let err = verifier(archive, offers_only())
            .verify(100, &TransformedOutput::default(), &ShutdownSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotACheckpoint(100)));
    }

    #[tokio::test]
    async fn evicts_on_match_and_on_mismatch() {
        let archive = Arc::new(InMemoryArchive::new());
        archive.insert(63, EntryType::Offer, keys(&["o1"])).unwrap();
        archive.insert(127, EntryType::Offer, keys(&["o1", "o2"])).unwrap();

        let mut agg = CheckpointAggregate::new();
        agg.record(63, row(EntryType::Offer, "o1", 63));
        agg.record(127, row(EntryType::Offer, "o1", 127));

        let v = verifier(archive, offers_only());
        let never = ShutdownSignal::never();
        assert!(v.verify_and_evict(&mut agg, 63, &never).await.unwrap().is_match());
        assert!(!v.verify_and_evict(&mut agg, 127, &never).await.unwrap().is_match());
        assert!(agg.is_empty());
    }

    #[tokio::test]
    async fn evicts_when_the_archive_fails() {
        let archive = Arc::new(InMemoryArchive::new());
        let mut agg = CheckpointAggregate::new();
        agg.record(191, row(EntryType::Offer, "o1", 191));

        let err = verifier(archive, offers_only())
            .verify_and_evict(&mut agg, 191, &ShutdownSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Archive(ArchiveError::CheckpointNotFound(191))
        ));
        assert!(agg.get(191).is_none());
        assert!(agg.is_empty());
    }

    /// Never answers.
    struct StalledArchive;

    #[async_trait]
    impl HistoryArchive for StalledArchive {
        async fn fetch_entries(
            &self,
            _checkpoint: u32,
            _entry_type: EntryType,
            _cursor: Option<&str>,
            _limit: usize,
        ) -> ArchiveResult<ArchivePage> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancellation_abandons_pending_requests() {
        let v = CheckpointVerifier::new(Arc::new(StalledArchive), offers_only());
        let (handle, signal) = shutdown_channel();

        let task = tokio::spawn(async move {
            v.verify(63, &TransformedOutput::default(), &signal).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.trigger();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(VerifyError::Cancelled(63))));
    }

    /// Hands back the same cursor forever.
    struct LoopingArchive;

    #[async_trait]
    impl HistoryArchive for LoopingArchive {
        async fn fetch_entries(
            &self,
            _checkpoint: u32,
            _entry_type: EntryType,
            _cursor: Option<&str>,
            _limit: usize,
        ) -> ArchiveResult<ArchivePage> {
            Ok(ArchivePage {
                keys: vec![],
                next_cursor: Some("same".into()),
            })
        }
    }

    #[tokio::test]
    async fn repeated_cursor_is_an_error() {
        let v = CheckpointVerifier::new(Arc::new(LoopingArchive), offers_only());
        let err = v
            .verify(63, &TransformedOutput::default(), &ShutdownSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Archive(ArchiveError::InvalidCursor(_))
        ));
    }
}
