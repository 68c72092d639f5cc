//! UTXO record types.
//!
//! A [`UtxoRecord`] is created once, by the block that produced the output,
//! and then only ever transitions `unspent -> spent` (by a later block) or
//! `spent -> unspent` (by a rollback that removes the spending block). It is
//! never mutated in any other way, and it is deleted only when the block
//! that created it is rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction id, left-padded with `'0'` to 64 lowercase hex characters.
pub type Txid = String;

/// One unspent-or-spent transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    /// 64-character lowercase hex id of the producing transaction.
    pub txid: Txid,
    /// 0-based output index within the producing transaction.
    pub vout: u32,
    /// Opaque recipient identifier.
    pub address: String,
    /// Amount; fits in 63 bits.
    pub value: u64,
    /// Height of the block that created this output.
    pub block_height: u64,
    /// Whether this output has been spent.
    pub spent: bool,
    /// Id of the spending transaction, padded to 64 hex chars. Set iff `spent`.
    pub spent_txid: Option<Txid>,
    /// When the spend was recorded. Set iff `spent`.
    pub spent_at: Option<DateTime<Utc>>,
    /// Always the empty string; no plan to populate it.
    pub script_pubkey: String,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
}

/// Identifies a single output: the key UTXOs are uniquely indexed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<Txid>, vout: u32) -> Self {
        OutPoint { txid: txid.into(), vout }
    }
}
