use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Ledgers between published history checkpoints, by network convention.
pub const CHECKPOINT_FREQUENCY: u32 = 64;

/// `true` if `seq` is a checkpoint ledger under the network's default
/// frequency: `(seq + 1) % 64 == 0`.
pub fn is_checkpoint(seq: u32) -> bool {
    CheckpointSchedule::default().is_checkpoint(seq)
}

/// The periodic rule deciding which ledgers are checkpoints.
///
/// The router and the verifier must share one schedule; both take it from
/// the export configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CheckpointSchedule {
    frequency: NonZeroU32,
}

impl CheckpointSchedule {
    pub fn new(frequency: u32) -> Result<Self, TypeError> {
        NonZeroU32::new(frequency)
            .map(|frequency| Self { frequency })
            .ok_or(TypeError::ZeroCheckpointFrequency)
    }

    pub fn frequency(&self) -> u32 {
        self.frequency.get()
    }

    /// Total over `u32`: the successor is computed in 64 bits so that
    /// `u32::MAX` does not wrap.
    pub fn is_checkpoint(&self, seq: u32) -> bool {
        (u64::from(seq) + 1) % u64::from(self.frequency.get()) == 0
    }

    /// The first checkpoint at or after `seq`, if one fits in `u32`.
    pub fn next_checkpoint(&self, seq: u32) -> Option<u32> {
        let freq = u64::from(self.frequency.get());
        let next = (u64::from(seq) + 1).div_ceil(freq) * freq - 1;
        u32::try_from(next).ok()
    }

    /// Checkpoint ledgers within `[start, end]`, ascending.
    pub fn checkpoints_in(&self, start: u32, end: u32) -> impl Iterator<Item = u32> {
        let step = u64::from(self.frequency.get());
        let first = self.next_checkpoint(start).map(u64::from);
        let end = u64::from(end);
        first
            .into_iter()
            .flat_map(move |first| (first..=end).step_by(step as usize))
            .filter_map(|seq| u32::try_from(seq).ok())
    }
}

impl Default for CheckpointSchedule {
    fn default() -> Self {
        Self {
            frequency: NonZeroU32::MIN.saturating_add(CHECKPOINT_FREQUENCY - 1),
        }
    }
}

impl TryFrom<u32> for CheckpointSchedule {
    type Error = TypeError;

    fn try_from(frequency: u32) -> Result<Self, Self::Error> {
        Self::new(frequency)
    }
}

impl From<CheckpointSchedule> for u32 {
    fn from(schedule: CheckpointSchedule) -> Self {
        schedule.frequency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_checkpoints() {
        assert!(is_checkpoint(63));
        assert!(is_checkpoint(127));
        assert!(is_checkpoint(191));
        assert!(!is_checkpoint(0));
        assert!(!is_checkpoint(64));
        assert!(!is_checkpoint(192));
    }

    #[test]
    fn max_ledger_does_not_overflow() {
        // u32::MAX + 1 == 2^32, which is a multiple of 64.
        assert!(is_checkpoint(u32::MAX));
        assert_eq!(CheckpointSchedule::default().next_checkpoint(u32::MAX), Some(u32::MAX));
    }

    #[test]
    fn zero_frequency_rejected() {
        assert_eq!(
            CheckpointSchedule::new(0).unwrap_err(),
            TypeError::ZeroCheckpointFrequency
        );
    }

    #[test]
    fn default_frequency_is_network_convention() {
        assert_eq!(CheckpointSchedule::default().frequency(), CHECKPOINT_FREQUENCY);
    }

    #[test]
    fn checkpoints_in_range() {
        let schedule = CheckpointSchedule::default();
        let found: Vec<_> = schedule.checkpoints_in(100, 400).collect();
        assert_eq!(found, vec![127, 191, 255, 319, 383]);
        assert_eq!(schedule.checkpoints_in(192, 254).count(), 0);
        assert_eq!(schedule.checkpoints_in(191, 191).collect::<Vec<_>>(), vec![191]);
    }

    #[test]
    fn schedule_serializes_as_frequency() {
        let schedule = CheckpointSchedule::new(8).unwrap();
        assert_eq!(serde_json::to_string(&schedule).unwrap(), "8");
        assert!(serde_json::from_str::<CheckpointSchedule>("0").is_err());
    }

    proptest! {
        #[test]
        fn detection_matches_modulus_rule(seq in any::<u32>()) {
            prop_assert_eq!(is_checkpoint(seq), (u64::from(seq) + 1) % 64 == 0);
        }

        #[test]
        fn next_checkpoint_is_a_checkpoint(seq in 0u32..u32::MAX - 1024, freq in 1u32..512) {
            let schedule = CheckpointSchedule::new(freq).unwrap();
            let next = schedule.next_checkpoint(seq).unwrap();
            prop_assert!(next >= seq);
            prop_assert!(schedule.is_checkpoint(next));
            prop_assert!((seq..next).all(|s| !schedule.is_checkpoint(s)));
        }
    }
}
