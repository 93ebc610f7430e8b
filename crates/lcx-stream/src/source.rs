use async_trait::async_trait;
use lcx_types::{LedgerChanges, LedgerRange};

use crate::error::StreamResult;

/// Boundary to the external ledger-replay engine.
///
/// A source yields one [`LedgerChanges`] per closed ledger, in ascending
/// sequence. The accumulator checks that promise; a source that breaks it
/// fails the run.
#[async_trait]
pub trait ChangeSource: Send {
    /// Position the source at the start of `range`.
    async fn prepare(&mut self, range: LedgerRange) -> StreamResult<()>;

    /// The next closed ledger, waiting until one is available.
    ///
    /// `Ok(None)` means the source has nothing more to give.
    async fn next_ledger(&mut self) -> StreamResult<Option<LedgerChanges>>;
}

#[async_trait]
impl<S: ChangeSource + ?Sized> ChangeSource for Box<S> {
    async fn prepare(&mut self, range: LedgerRange) -> StreamResult<()> {
        (**self).prepare(range).await
    }

    async fn next_ledger(&mut self) -> StreamResult<Option<LedgerChanges>> {
        (**self).next_ledger().await
    }
}
