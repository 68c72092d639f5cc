//! Property tests for the universal invariants over sequences of synthetic
//! blocks, run against both store backends (in-memory and SQLite) so a
//! passing run means the invariant holds independent of the backend.

use proptest::prelude::*;
use utxoledger_core::{Block, Input, Output, Transaction};
use utxoledger_database::SqliteStore;
use utxoledger_indexer::{process_block, rollback_to_height, IndexerError};
use utxoledger_store::{InMemoryStore, UtxoStore};

fn coinbase_block(height: u64, address: &str, value: u64) -> Block {
    let tx = Transaction {
        id: format!("tx{height}z"),
        inputs: vec![Input {
            tx_id: "0".to_string(),
            index: 0,
        }],
        outputs: vec![Output {
            address: address.to_string(),
            value,
        }],
    };
    let mut block = Block {
        id: String::new(),
        height,
        transactions: vec![tx],
    };
    block.id = block.expected_id();
    block
}

async fn tip_heights(store: &dyn UtxoStore) -> Vec<u64> {
    let rows = store.find_above(0).await.unwrap();
    let mut heights: Vec<u64> = rows.iter().map(|r| r.block_height).collect();
    heights.sort_unstable();
    heights.dedup();
    heights
}

async fn store_snapshot(store: &dyn UtxoStore) -> Vec<(String, u32, String, u64, u64, bool)> {
    let mut rows: Vec<_> = store
        .find_above(0)
        .await
        .unwrap()
        .into_iter()
        .map(|u| (u.txid, u.vout, u.address, u.value, u.block_height, u.spent))
        .collect();
    rows.sort();
    rows
}

/// Runs `body` once per conforming store backend (C8 and C9).
async fn for_each_backend<F>(body: F)
where
    F: for<'a> Fn(&'a dyn UtxoStore) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>>,
{
    let mem = InMemoryStore::new();
    body(&mem).await;

    let sqlite = SqliteStore::connect(":memory:").unwrap();
    body(&sqlite).await;
}

proptest! {
    #[test]
    fn height_contiguity_holds_after_ingesting_n_blocks(n in 0u64..12) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(for_each_backend(|store| Box::pin(async move {
            for h in 1..=n {
                let block = coinbase_block(h, "addr", h + 1);
                process_block(store, &block).await.unwrap();
            }
            let heights = tip_heights(store).await;
            let expected: Vec<u64> = (1..=n).collect();
            assert_eq!(heights, expected);
            assert_eq!(store.tip().await.unwrap(), n);
        })));
    }

    #[test]
    fn rollback_inverts_ingest(n in 1u64..8, k in 0u64..8) {
        prop_assume!(k <= n);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let full = InMemoryStore::new();
            for h in 1..=n {
                let block = coinbase_block(h, "addr", h + 1);
                process_block(&full, &block).await.unwrap();
            }
            if k < n {
                rollback_to_height(&full, k as i64).await.unwrap();
            }

            let truncated = InMemoryStore::new();
            for h in 1..=k {
                let block = coinbase_block(h, "addr", h + 1);
                process_block(&truncated, &block).await.unwrap();
            }

            prop_assert_eq!(
                store_snapshot(&full).await,
                store_snapshot(&truncated).await
            );

            let full_sqlite = SqliteStore::connect(":memory:").unwrap();
            for h in 1..=n {
                let block = coinbase_block(h, "addr", h + 1);
                process_block(&full_sqlite, &block).await.unwrap();
            }
            if k < n {
                rollback_to_height(&full_sqlite, k as i64).await.unwrap();
            }
            prop_assert_eq!(store_snapshot(&full_sqlite).await, store_snapshot(&truncated).await);
            Ok(())
        })?;
    }

    #[test]
    fn idempotent_rollback_failure(n in 0u64..8) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(for_each_backend(|store| Box::pin(async move {
            for h in 1..=n {
                let block = coinbase_block(h, "addr", h + 1);
                process_block(store, &block).await.unwrap();
            }
            let tip = store.tip().await.unwrap();
            let before = store_snapshot(store).await;

            let err = rollback_to_height(store, tip as i64).await.unwrap_err();
            assert!(matches!(err, IndexerError::NoBlocksToRollback(_)));

            let after = store_snapshot(store).await;
            assert_eq!(before, after);
        })));
    }

    #[test]
    fn balance_identity_holds(n in 0u64..8) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(for_each_backend(|store| Box::pin(async move {
            for h in 1..=n {
                let block = coinbase_block(h, "addr", h + 1);
                process_block(store, &block).await.unwrap();
            }
            let expected: u64 = store
                .find_above(0)
                .await
                .unwrap()
                .iter()
                .filter(|u| !u.spent && u.address == "addr")
                .map(|u| u.value)
                .sum();
            assert_eq!(store.balance("addr").await.unwrap(), expected);
        })));
    }

    #[test]
    fn block_id_is_deterministic_across_runs(height in 1u64..1000, tx_ids in prop::collection::vec("[a-z0-9]{1,10}", 0..5)) {
        let transactions: Vec<Transaction> = tx_ids
            .iter()
            .map(|id| Transaction {
                id: id.clone(),
                inputs: vec![],
                outputs: vec![],
            })
            .collect();
        let block = Block { id: String::new(), height, transactions };
        let a = block.expected_id();
        let b = block.expected_id();
        prop_assert_eq!(a.len(), 64);
        prop_assert_eq!(a, b);
    }
}
