use lcx_types::{EntryType, LedgerChange};

use crate::error::{TransformError, TransformResult};
use crate::output::OutputRow;

/// Field-mapping step that turns a decoded change into an output row.
///
/// One handler per entry type; the router picks the handler with an
/// exhaustive match on the change's [`EntryType`]. Implementations must be
/// pure: the same change always yields the same row or the same error.
pub trait EntryTransformer: Send + Sync {
    fn account(&self, change: &LedgerChange) -> TransformResult<OutputRow>;

    fn offer(&self, change: &LedgerChange) -> TransformResult<OutputRow>;

    fn trustline(&self, change: &LedgerChange) -> TransformResult<OutputRow>;

    fn liquidity_pool(&self, change: &LedgerChange) -> TransformResult<OutputRow>;

    fn claimable_balance(&self, change: &LedgerChange) -> TransformResult<OutputRow>;
}

/// Default transformer: exports the entry's current state verbatim.
///
/// Offers, trustlines and pools must carry an object state; accounts and
/// claimable balances accept any JSON value.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotTransformer;

impl SnapshotTransformer {
    fn project(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        let state = change
            .current_state()
            .ok_or_else(|| TransformError::MissingState {
                entry_type: change.entry_type,
                key: change.key.to_string(),
            })?;
        Ok(OutputRow {
            entry_type: change.entry_type,
            key: change.key.clone(),
            ledger_seq: change.last_modified_ledger_seq,
            removed: change.is_removal(),
            fields: state.clone(),
        })
    }

    fn project_object(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        let row = self.project(change)?;
        if !row.fields.is_object() {
            return Err(TransformError::InvalidEntry {
                entry_type: change.entry_type,
                key: change.key.to_string(),
                reason: "state is not an object".into(),
            });
        }
        Ok(row)
    }
}

impl EntryTransformer for SnapshotTransformer {
    fn account(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        self.project(change)
    }

    fn offer(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        self.project_object(change)
    }

    fn trustline(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        self.project_object(change)
    }

    fn liquidity_pool(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        self.project_object(change)
    }

    fn claimable_balance(&self, change: &LedgerChange) -> TransformResult<OutputRow> {
        self.project(change)
    }
}

/// Dispatch `change` to the handler for its entry type.
pub(crate) fn dispatch(
    transformer: &dyn EntryTransformer,
    change: &LedgerChange,
) -> TransformResult<OutputRow> {
    match change.entry_type {
        EntryType::Account => transformer.account(change),
        EntryType::Offer => transformer.offer(change),
        EntryType::Trustline => transformer.trustline(change),
        EntryType::LiquidityPool => transformer.liquidity_pool(change),
        EntryType::ClaimableBalance => transformer.claimable_balance(change),
    }
}
