use std::collections::BTreeMap;

use lcx_types::{EntryKey, EntryType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One exported row. Its `fields` are owned by the transform step and are
/// opaque to routing and verification, which only look at the identity and
/// the `removed` flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub entry_type: EntryType,
    pub key: EntryKey,
    pub ledger_seq: u32,
    pub removed: bool,
    pub fields: Value,
}

impl OutputRow {
    /// `true` if the entry still exists after the change.
    pub fn is_live(&self) -> bool {
        !self.removed
    }
}

/// Rows produced from one batch (or collected for one checkpoint), kept in
/// arrival order per entry type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformedOutput {
    pub accounts: Vec<OutputRow>,
    pub offers: Vec<OutputRow>,
    pub trustlines: Vec<OutputRow>,
    pub liquidity_pools: Vec<OutputRow>,
    pub claimable_balances: Vec<OutputRow>,
}

impl TransformedOutput {
    pub fn rows(&self, entry_type: EntryType) -> &[OutputRow] {
        match entry_type {
            EntryType::Account => &self.accounts,
            EntryType::Offer => &self.offers,
            EntryType::Trustline => &self.trustlines,
            EntryType::LiquidityPool => &self.liquidity_pools,
            EntryType::ClaimableBalance => &self.claimable_balances,
        }
    }

    pub fn rows_mut(&mut self, entry_type: EntryType) -> &mut Vec<OutputRow> {
        match entry_type {
            EntryType::Account => &mut self.accounts,
            EntryType::Offer => &mut self.offers,
            EntryType::Trustline => &mut self.trustlines,
            EntryType::LiquidityPool => &mut self.liquidity_pools,
            EntryType::ClaimableBalance => &mut self.claimable_balances,
        }
    }

    /// Append a row under its own entry type.
    pub fn push(&mut self, row: OutputRow) {
        self.rows_mut(row.entry_type).push(row);
    }

    /// Every entry type with its rows, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryType, &[OutputRow])> {
        EntryType::ALL.into_iter().map(|t| (t, self.rows(t)))
    }

    pub fn len(&self) -> usize {
        self.iter().map(|(_, rows)| rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row count per entry type, omitting empty types.
    pub fn counts(&self) -> BTreeMap<EntryType, usize> {
        self.iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(t, rows)| (t, rows.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(entry_type: EntryType, key: &str) -> OutputRow {
        OutputRow {
            entry_type,
            key: EntryKey::new(key),
            ledger_seq: 1,
            removed: false,
            fields: json!({}),
        }
    }

    #[test]
    fn push_files_rows_by_type() {
        let mut out = TransformedOutput::default();
        out.push(row(EntryType::Offer, "o1"));
        out.push(row(EntryType::Account, "a1"));
        out.push(row(EntryType::Offer, "o2"));

        assert_eq!(out.len(), 3);
        assert_eq!(out.offers.len(), 2);
        assert_eq!(out.rows(EntryType::Account)[0].key.as_str(), "a1");
        assert!(out.rows(EntryType::ClaimableBalance).is_empty());
    }

    #[test]
    fn counts_skip_empty_types() {
        let mut out = TransformedOutput::default();
        assert!(out.counts().is_empty());
        out.push(row(EntryType::Trustline, "t1"));
        let counts = out.counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&EntryType::Trustline], 1);
    }

    #[test]
    fn removed_rows_are_not_live() {
        let mut r = row(EntryType::Offer, "o1");
        assert!(r.is_live());
        r.removed = true;
        assert!(!r.is_live());
    }
}
