//! Balance Query (C5).

use utxoledger_store::UtxoStore;

use crate::error::IndexerError;

/// Sum of unspent value for `address`; 0 for an address that has never
/// received a UTXO. Does not go through the Serialization Gate.
pub async fn get_balance(store: &dyn UtxoStore, address: &str) -> Result<u64, IndexerError> {
    Ok(store.balance(address).await?)
}
