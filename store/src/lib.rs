//! The UTXO store repository contract (C1).
//!
//! [`UtxoStore`] is the one seam every other component talks to the backing
//! store through. It is injected into the engines as `Arc<dyn UtxoStore>` at
//! construction time; nothing looks it up globally. Two implementations ship
//! in this workspace: [`InMemoryStore`] here, and the SQLite-backed store in
//! `utxoledger-database`. Both satisfy the same contract, so the same tests
//! run against either.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use utxoledger_core::{OutPoint, UtxoRecord};

/// Errors a [`UtxoStore`] implementation can return.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `insert` was called with a `(txid, vout)` that already exists.
    #[error("UTXO already exists: {0}")]
    AlreadyExists(String),

    /// `markSpent` was called against a row that does not exist or is
    /// already spent.
    #[error("UTXO not found: {0}")]
    NotFound(String),

    /// Any other backend failure (I/O, driver, constraint violation other
    /// than the two above).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable set of UTXO records with the queries the indexing engine needs.
///
/// Every method is atomic with respect to the row(s) it touches; callers
/// that need several of these calls to appear atomic as a group (e.g. block
/// apply, or rollback) rely on the Serialization Gate, not on this trait.
#[async_trait]
pub trait UtxoStore: Send + Sync {
    /// Adds one UTXO. Violating `(txid, vout)` uniqueness is
    /// [`StoreError::AlreadyExists`].
    async fn insert(&self, record: UtxoRecord) -> Result<(), StoreError>;

    /// For each requested outpoint, returns the record iff it exists and is
    /// unspent. Order of results is not guaranteed. Empty input yields empty
    /// output.
    async fn find_unspent(&self, refs: &[OutPoint]) -> Result<Vec<UtxoRecord>, StoreError>;

    /// Marks the referenced UTXO spent by `spending_txid`, stamping
    /// `spent_at = now`. [`StoreError::NotFound`] if there is no such row or
    /// it is already spent.
    async fn mark_spent(&self, outpoint: &OutPoint, spending_txid: &str) -> Result<(), StoreError>;

    /// Sum of `value` over unspent UTXOs for `address`; 0 if none.
    async fn balance(&self, address: &str) -> Result<u64, StoreError>;

    /// `max(block_height)` over all rows; 0 if the store is empty.
    async fn tip(&self) -> Result<u64, StoreError>;

    /// All rows with `block_height > height`.
    async fn find_above(&self, height: u64) -> Result<Vec<UtxoRecord>, StoreError>;

    /// For every row with `spent = true` and `spent_txid` in `ids`, clears
    /// `spent`, `spent_txid`, and `spent_at`. A no-op on empty `ids`.
    async fn unspend_by_spending_txids(&self, ids: &[String]) -> Result<(), StoreError>;

    /// Deletes every row with `block_height > height`.
    async fn delete_above(&self, height: u64) -> Result<(), StoreError>;

    /// Applies one block's effects: marks `spends` spent, then inserts
    /// `outputs`. The default implementation calls the primitives above in
    /// sequence; a backend with real transactions should override this to
    /// wrap both phases in one, so a mid-apply failure leaves no partial
    /// row behind.
    async fn apply_block(
        &self,
        spends: &[(OutPoint, String)],
        outputs: &[UtxoRecord],
    ) -> Result<(), StoreError> {
        for (outpoint, spending_txid) in spends {
            self.mark_spent(outpoint, spending_txid).await?;
        }
        for record in outputs {
            self.insert(record.clone()).await?;
        }
        Ok(())
    }

    /// Applies a rollback's effects: unspends `spending_txids`, then deletes
    /// every row above `target_height`. The default implementation calls
    /// the primitives above in sequence (in the order the invariant in
    /// §4.2 requires); a backend with real transactions should override
    /// this to wrap both phases in one.
    async fn apply_rollback(
        &self,
        spending_txids: &[String],
        target_height: u64,
    ) -> Result<(), StoreError> {
        self.unspend_by_spending_txids(spending_txids).await?;
        self.delete_above(target_height).await?;
        Ok(())
    }
}
