use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Category of ledger state a change affects.
///
/// The set is closed: every consumer matches on it exhaustively, so adding a
/// variant forces each handler to be revisited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Account,
    Offer,
    Trustline,
    LiquidityPool,
    ClaimableBalance,
}

impl EntryType {
    /// Every entry type, in canonical order.
    pub const ALL: [EntryType; 5] = [
        EntryType::Account,
        EntryType::Offer,
        EntryType::Trustline,
        EntryType::LiquidityPool,
        EntryType::ClaimableBalance,
    ];

    /// Stable lowercase name, used in logs and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Account => "account",
            EntryType::Offer => "offer",
            EntryType::Trustline => "trustline",
            EntryType::LiquidityPool => "liquidity_pool",
            EntryType::ClaimableBalance => "claimable_balance",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownEntryType(s.to_string()))
    }
}

/// Identity of a single ledger entry (account id, offer id, trustline
/// account/asset pair, ...), rendered as an opaque string.
///
/// Two rows describe the same entry iff their keys are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntryKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
