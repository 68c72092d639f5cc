//! Block Validator & Ingestor (C3).

use chrono::Utc;
use log::{info, warn};
use utxoledger_core::{pad64, Block, Transaction};
use utxoledger_core::{OutPoint, UtxoRecord};
use utxoledger_store::UtxoStore;

use crate::error::IndexerError;

/// Validates `block` against the current store state and, if it is
/// accepted, applies its effects. Returns the first failing check with the
/// store left untouched; a store fault during apply propagates as
/// [`IndexerError::Database`].
pub async fn process_block(store: &dyn UtxoStore, block: &Block) -> Result<(), IndexerError> {
    let tip = store.tip().await?;
    let expected_height = tip + 1;
    if block.height != expected_height {
        warn!(
            "rejecting block at height {}, expected {}",
            block.height, expected_height
        );
        return Err(IndexerError::InvalidBlockHeight {
            observed: block.height,
            expected: expected_height,
        });
    }

    let mut spends = Vec::new();
    let mut outputs = Vec::new();

    for tx in &block.transactions {
        let has_coinbase = tx.has_coinbase_input();
        let all_coinbase = tx.all_inputs_coinbase();
        if has_coinbase && !all_coinbase {
            return Err(IndexerError::InvalidInputOutputSum(format!(
                "transaction {} mixes coinbase and non-coinbase inputs",
                tx.id
            )));
        }

        if has_coinbase {
            collect_outputs(tx, block.height, &mut outputs);
            continue;
        }

        if tx.inputs.is_empty() {
            let output_sum = sum_outputs(tx)?;
            if output_sum != 0 {
                return Err(IndexerError::InvalidInputOutputSum(format!(
                    "transaction {} has no inputs but outputs sum to {}",
                    tx.id, output_sum
                )));
            }
            collect_outputs(tx, block.height, &mut outputs);
            continue;
        }

        let refs: Vec<OutPoint> = tx
            .inputs
            .iter()
            .map(|i| OutPoint::new(pad64(&i.tx_id), i.index as u32))
            .collect();
        let found = store.find_unspent(&refs).await?;
        if found.len() != refs.len() {
            return Err(IndexerError::InvalidInputOutputSum(format!(
                "transaction {} references an unknown or already-spent input",
                tx.id
            )));
        }

        let input_sum = checked_sum(found.iter().map(|u| u.value)).ok_or_else(|| {
            IndexerError::InvalidInputOutputSum(format!(
                "transaction {} input sum overflows",
                tx.id
            ))
        })?;
        let output_sum = sum_outputs(tx)?;
        if input_sum != output_sum {
            warn!(
                "rejecting transaction {}: input sum {} != output sum {}",
                tx.id, input_sum, output_sum
            );
            return Err(IndexerError::InvalidInputOutputSum(format!(
                "transaction {} input sum {} != output sum {}",
                tx.id, input_sum, output_sum
            )));
        }

        let spending_txid = pad64(&tx.id);
        for r in refs {
            spends.push((r, spending_txid.clone()));
        }
        collect_outputs(tx, block.height, &mut outputs);
    }

    let expected_id = block.expected_id();
    if block.id != expected_id {
        warn!(
            "rejecting block at height {}, id mismatch: expected {}, got {}",
            block.height, expected_id, block.id
        );
        return Err(IndexerError::InvalidBlockId {
            expected: expected_id,
            actual: block.id.clone(),
        });
    }

    store.apply_block(&spends, &outputs).await?;
    info!(
        "ingested block at height {}: {} transaction(s), {} output(s)",
        block.height,
        block.transactions.len(),
        outputs.len()
    );
    Ok(())
}

fn collect_outputs(tx: &Transaction, block_height: u64, outputs: &mut Vec<UtxoRecord>) {
    let txid = pad64(&tx.id);
    let now = Utc::now();
    for (i, output) in tx.outputs.iter().enumerate() {
        outputs.push(UtxoRecord {
            txid: txid.clone(),
            vout: i as u32,
            address: output.address.clone(),
            value: output.value,
            block_height,
            spent: false,
            spent_txid: None,
            spent_at: None,
            script_pubkey: String::new(),
            created_at: now,
        });
    }
}

fn sum_outputs(tx: &Transaction) -> Result<u64, IndexerError> {
    checked_sum(tx.outputs.iter().map(|o| o.value))
        .ok_or_else(|| IndexerError::InvalidInputOutputSum(format!("transaction {} output sum overflows", tx.id)))
}

fn checked_sum(mut values: impl Iterator<Item = u64>) -> Option<u64> {
    values.try_fold(0u64, |acc, v| acc.checked_add(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use utxoledger_core::{Input, Output};
    use utxoledger_store::InMemoryStore;

    fn coinbase_input(value_marker: &str) -> Input {
        Input {
            tx_id: value_marker.to_string(),
            index: 0,
        }
    }

    #[tokio::test]
    async fn accepts_a_valid_coinbase_block() {
        let store = InMemoryStore::default();
        let tx = Transaction {
            id: "t1".to_string(),
            inputs: vec![coinbase_input("0")],
            outputs: vec![Output {
                address: "A".to_string(),
                value: 50,
            }],
        };
        let mut block = Block {
            id: String::new(),
            height: 1,
            transactions: vec![tx],
        };
        block.id = block.expected_id();

        process_block(&store, &block).await.unwrap();
        assert_eq!(store.balance("A").await.unwrap(), 50);
        assert_eq!(store.tip().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_wrong_height() {
        let store = InMemoryStore::default();
        let mut block = Block {
            id: String::new(),
            height: 2,
            transactions: vec![],
        };
        block.id = block.expected_id();

        let err = process_block(&store, &block).await.unwrap_err();
        assert!(matches!(err, IndexerError::InvalidBlockHeight { .. }));
    }

    #[tokio::test]
    async fn rejects_bad_block_id() {
        let store = InMemoryStore::default();
        let block = Block {
            id: "not-the-real-id".to_string(),
            height: 1,
            transactions: vec![],
        };

        let err = process_block(&store, &block).await.unwrap_err();
        assert!(matches!(err, IndexerError::InvalidBlockId { .. }));
    }

    #[tokio::test]
    async fn rejects_unbalanced_regular_transaction() {
        let store = Arc::new(InMemoryStore::default());
        let coinbase_tx = Transaction {
            id: "c1".to_string(),
            inputs: vec![coinbase_input("0")],
            outputs: vec![Output {
                address: "A".to_string(),
                value: 100,
            }],
        };
        let mut block1 = Block {
            id: String::new(),
            height: 1,
            transactions: vec![coinbase_tx],
        };
        block1.id = block1.expected_id();
        process_block(store.as_ref(), &block1).await.unwrap();

        let spend_tx = Transaction {
            id: "c1".to_string(),
            inputs: vec![Input {
                tx_id: "c1".to_string(),
                index: 0,
            }],
            outputs: vec![Output {
                address: "B".to_string(),
                value: 999,
            }],
        };
        let mut block2 = Block {
            id: String::new(),
            height: 2,
            transactions: vec![spend_tx],
        };
        block2.id = block2.expected_id();

        let err = process_block(store.as_ref(), &block2).await.unwrap_err();
        assert!(matches!(err, IndexerError::InvalidInputOutputSum(_)));
    }
}
