//! An in-memory [`UtxoStore`], used by the crate's own tests and available
//! to downstream integration tests so they never touch the filesystem.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use tokio::sync::RwLock;
use utxoledger_core::{OutPoint, UtxoRecord};

use crate::{StoreError, UtxoStore};

/// `HashMap`-backed store guarded by a single `RwLock`, matching the
/// granularity of a single serialized writer (the Serialization Gate already
/// ensures there is only ever one).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<(String, u32), UtxoRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UtxoStore for InMemoryStore {
    async fn insert(&self, record: UtxoRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let key = (record.txid.clone(), record.vout);
        if rows.contains_key(&key) {
            warn!("insert rejected, outpoint already exists: {}:{}", key.0, key.1);
            return Err(StoreError::AlreadyExists(format!(
                "{}:{}",
                key.0, key.1
            )));
        }
        debug!("inserted utxo {}:{}", key.0, key.1);
        rows.insert(key, record);
        Ok(())
    }

    async fn find_unspent(&self, refs: &[OutPoint]) -> Result<Vec<UtxoRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(refs
            .iter()
            .filter_map(|r| rows.get(&(r.txid.clone(), r.vout)))
            .filter(|row| !row.spent)
            .cloned()
            .collect())
    }

    async fn mark_spent(&self, outpoint: &OutPoint, spending_txid: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let key = (outpoint.txid.clone(), outpoint.vout);
        match rows.get_mut(&key) {
            Some(row) if !row.spent => {
                row.spent = true;
                row.spent_txid = Some(spending_txid.to_string());
                row.spent_at = Some(Utc::now());
                debug!("marked utxo {}:{} spent by {}", key.0, key.1, spending_txid);
                Ok(())
            }
            _ => {
                warn!("mark_spent found no unspent utxo at {}:{}", key.0, key.1);
                Err(StoreError::NotFound(format!("{}:{}", key.0, key.1)))
            }
        }
    }

    async fn balance(&self, address: &str) -> Result<u64, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|row| !row.spent && row.address == address)
            .map(|row| row.value)
            .sum())
    }

    async fn tip(&self) -> Result<u64, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.values().map(|row| row.block_height).max().unwrap_or(0))
    }

    async fn find_above(&self, height: u64) -> Result<Vec<UtxoRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|row| row.block_height > height)
            .cloned()
            .collect())
    }

    async fn unspend_by_spending_txids(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut rows = self.rows.write().await;
        for row in rows.values_mut() {
            if row.spent && row.spent_txid.as_deref().is_some_and(|t| ids.iter().any(|id| id == t)) {
                row.spent = false;
                row.spent_txid = None;
                row.spent_at = None;
            }
        }
        Ok(())
    }

    async fn delete_above(&self, height: u64) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.retain(|_, row| row.block_height <= height);
        Ok(())
    }
}
