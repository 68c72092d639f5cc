//! Rollback Engine (C4).

use log::{info, warn};
use utxoledger_store::UtxoStore;

use crate::error::IndexerError;

/// Reverses every block above `target`: unspends outputs consumed by
/// transactions created above `target`, then deletes those blocks' outputs.
pub async fn rollback_to_height(store: &dyn UtxoStore, target: i64) -> Result<(), IndexerError> {
    if target < 0 {
        warn!("rejecting rollback to negative height {}", target);
        return Err(IndexerError::InvalidRollbackHeight(format!(
            "rollback height must be non-negative, got {}",
            target
        )));
    }
    let target = target as u64;

    let tip = store.tip().await?;
    if target > tip {
        warn!("rejecting rollback to height {}, above current tip {}", target, tip);
        return Err(IndexerError::InvalidRollbackHeight(format!(
            "rollback height {} is above current tip {}",
            target, tip
        )));
    }

    let victims = store.find_above(target).await?;
    if victims.is_empty() {
        let message = if tip == 0 {
            format!(
                "Cannot rollback to height {}: no blocks exist in the chain.",
                target
            )
        } else {
            format!(
                "Cannot rollback to height {}: no blocks exist above this height. Current height is {}.",
                target, tip
            )
        };
        warn!("{}", message);
        return Err(IndexerError::NoBlocksToRollback(message));
    }

    let spending_txids: Vec<String> = victims.into_iter().map(|utxo| utxo.txid).collect();
    store.apply_rollback(&spending_txids, target).await?;
    info!("rolled back from height {} to height {}", tip, target);
    Ok(())
}
