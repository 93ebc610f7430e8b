use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use lcx_transform::EntryFilter;
use lcx_types::{CheckpointSchedule, LedgerRange, CHECKPOINT_FREQUENCY};
use lcx_verify::{VerifierConfig, VERIFY_BATCH_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

/// Settings for one export run.
///
/// Loaded from TOML; every field has a default so a file only needs to set
/// what differs. Call [`Self::validate`] before starting a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// First ledger to export. Must be greater than 0.
    pub start_ledger: u32,
    /// Last ledger to export; 0 keeps exporting as new ledgers close.
    pub end_ledger: u32,
    /// Ledgers per exported batch.
    pub batch_size: i64,
    /// Entry types to export. Selecting none exports all of them.
    pub export: EntryFilter,
    /// Archive entries fetched per page during checkpoint verification.
    pub verify_batch_size: usize,
    pub checkpoint_frequency: u32,
    /// Replay engine configuration. Required for unbounded runs.
    pub core_config: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            start_ledger: 0,
            end_ledger: 0,
            batch_size: 64,
            export: EntryFilter::default(),
            verify_batch_size: VERIFY_BATCH_SIZE,
            checkpoint_frequency: CHECKPOINT_FREQUENCY,
            core_config: None,
        }
    }
}

impl ExportConfig {
    pub fn load(path: &Path) -> ExportResult<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ExportError::Config(format!("{}: {e}", path.display())))
    }

    /// Check every setting, reporting the first violation.
    pub fn validate(&self) -> ExportResult<()> {
        self.range()?;
        self.batch_size()?;
        self.schedule()?;
        if self.verify_batch_size == 0 {
            return Err(ExportError::Config(
                "verify batch size must be greater than 0".into(),
            ));
        }
        if self.end_ledger == 0 && self.core_config.is_none() {
            return Err(ExportError::Config(
                "a replay engine config path is required when exporting continuously (end ledger 0)"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn range(&self) -> ExportResult<LedgerRange> {
        LedgerRange::from_bounds(self.start_ledger, self.end_ledger)
            .map_err(|e| ExportError::Config(e.to_string()))
    }

    pub fn batch_size(&self) -> ExportResult<NonZeroU32> {
        u32::try_from(self.batch_size)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                ExportError::Config(format!(
                    "batch size ({}) must be greater than 0 and fit in 32 bits",
                    self.batch_size
                ))
            })
    }

    pub fn schedule(&self) -> ExportResult<CheckpointSchedule> {
        CheckpointSchedule::new(self.checkpoint_frequency)
            .map_err(|e| ExportError::Config(e.to_string()))
    }

    pub fn verifier_config(&self) -> ExportResult<VerifierConfig> {
        Ok(VerifierConfig {
            page_size: self.verify_batch_size,
            filter: self.export,
            schedule: self.schedule()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcx_types::EntryType;
    use std::io::Write;

    fn bounded(start: u32, end: u32) -> ExportConfig {
        ExportConfig {
            start_ledger: start,
            end_ledger: end,
            ..ExportConfig::default()
        }
    }

    #[test]
    fn default_config() {
        let c = ExportConfig::default();
        assert_eq!(c.batch_size, 64);
        assert_eq!(c.verify_batch_size, 50_000);
        assert_eq!(c.checkpoint_frequency, 64);
        assert!(c.core_config.is_none());
    }

    #[test]
    fn bounded_range_validates() {
        let c = bounded(100, 249);
        c.validate().unwrap();
        assert_eq!(c.range().unwrap(), LedgerRange::bounded(100, 249).unwrap());
    }

    #[test]
    fn non_positive_batch_size_is_rejected() {
        for size in [0, -5, i64::from(u32::MAX) + 1] {
            let c = ExportConfig {
                batch_size: size,
                ..bounded(1, 10)
            };
            assert!(matches!(c.validate(), Err(ExportError::Config(_))), "{size}");
        }
    }

    #[test]
    fn zero_start_is_rejected() {
        assert!(matches!(bounded(0, 10).validate(), Err(ExportError::Config(_))));
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(matches!(bounded(10, 5).validate(), Err(ExportError::Config(_))));
    }

    #[test]
    fn unbounded_requires_core_config() {
        let mut c = bounded(1, 0);
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("replay engine config"));

        c.core_config = Some("core.cfg".into());
        c.validate().unwrap();
        assert!(!c.range().unwrap().is_bounded());
    }

    #[test]
    fn zero_frequency_and_page_size_are_rejected() {
        let c = ExportConfig {
            checkpoint_frequency: 0,
            ..bounded(1, 10)
        };
        assert!(c.validate().is_err());

        let c = ExportConfig {
            verify_batch_size: 0,
            ..bounded(1, 10)
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "start_ledger = 100\nend_ledger = 249\nbatch_size = 50\n\n[export]\noffers = true"
        )
        .unwrap();

        let c = ExportConfig::load(file.path()).unwrap();
        assert_eq!(c.batch_size, 50);
        assert_eq!(c.verify_batch_size, 50_000);
        assert_eq!(c.export.enabled(), vec![EntryType::Offer]);
        c.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "start_ledger = \"soon\"").unwrap();
        assert!(matches!(
            ExportConfig::load(file.path()),
            Err(ExportError::Config(_))
        ));
    }
}
