use lcx_types::EntryType;
use serde::{Deserialize, Serialize};

/// Which entry types an export covers.
///
/// Each type is toggled independently. When no type is set explicitly,
/// every type is enabled; setting any type disables the unset ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFilter {
    pub accounts: bool,
    pub offers: bool,
    pub trustlines: bool,
    pub liquidity_pools: bool,
    pub claimable_balances: bool,
}

impl EntryFilter {
    /// Every entry type enabled.
    pub fn all() -> Self {
        Self {
            accounts: true,
            offers: true,
            trustlines: true,
            liquidity_pools: true,
            claimable_balances: true,
        }
    }

    /// Only the given types enabled.
    pub fn only(types: &[EntryType]) -> Self {
        let mut filter = Self::default();
        for t in types {
            *filter.flag_mut(*t) = true;
        }
        filter
    }

    pub fn is_enabled(&self, entry_type: EntryType) -> bool {
        self.nothing_selected() || self.flag(entry_type)
    }

    /// Enabled types in canonical order.
    pub fn enabled(&self) -> Vec<EntryType> {
        EntryType::ALL
            .into_iter()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }

    fn nothing_selected(&self) -> bool {
        EntryType::ALL.into_iter().all(|t| !self.flag(t))
    }

    fn flag(&self, entry_type: EntryType) -> bool {
        match entry_type {
            EntryType::Account => self.accounts,
            EntryType::Offer => self.offers,
            EntryType::Trustline => self.trustlines,
            EntryType::LiquidityPool => self.liquidity_pools,
            EntryType::ClaimableBalance => self.claimable_balances,
        }
    }

    fn flag_mut(&mut self, entry_type: EntryType) -> &mut bool {
        match entry_type {
            EntryType::Account => &mut self.accounts,
            EntryType::Offer => &mut self.offers,
            EntryType::Trustline => &mut self.trustlines,
            EntryType::LiquidityPool => &mut self.liquidity_pools,
            EntryType::ClaimableBalance => &mut self.claimable_balances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_set_enables_everything() {
        let filter = EntryFilter::default();
        assert_eq!(filter.enabled(), EntryType::ALL.to_vec());
    }

    #[test]
    fn setting_one_disables_the_rest() {
        let filter = EntryFilter {
            offers: true,
            ..Default::default()
        };
        assert_eq!(filter.enabled(), vec![EntryType::Offer]);
        assert!(!filter.is_enabled(EntryType::Account));
    }

    #[test]
    fn only_selects_given_types() {
        let filter = EntryFilter::only(&[EntryType::Trustline, EntryType::LiquidityPool]);
        assert_eq!(
            filter.enabled(),
            vec![EntryType::Trustline, EntryType::LiquidityPool]
        );
    }

    #[test]
    fn deserializes_partial_tables() {
        let filter: EntryFilter = serde_json::from_str(r#"{"accounts":true}"#).unwrap();
        assert_eq!(filter.enabled(), vec![EntryType::Account]);
    }
}
