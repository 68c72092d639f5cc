//! Wire types for incoming blocks, and the block-identity hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width every txid is padded (or truncated) to before hashing or storage.
pub const TXID_WIDTH: usize = 64;

/// Right-pads `s` with `'0'` to exactly [`TXID_WIDTH`] characters, truncating
/// if it is already longer.
pub fn pad64(s: &str) -> String {
    if s.len() >= TXID_WIDTH {
        s[..TXID_WIDTH].to_string()
    } else {
        let mut padded = String::with_capacity(TXID_WIDTH);
        padded.push_str(s);
        padded.extend(std::iter::repeat_n('0', TXID_WIDTH - s.len()));
        padded
    }
}

/// True iff `s` consists of one or more `'0'` characters and nothing else.
///
/// This is the coinbase marker: a single `"0"` qualifies, as does any run of
/// zeros of any length. It is deliberately not a width-64 check.
pub fn is_coinbase_marker(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b == b'0')
}

/// A candidate transaction as received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

/// A transaction input, referencing a prior output by `(txId, index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    #[serde(rename = "txId")]
    pub tx_id: String,
    pub index: u64,
}

/// A transaction output: a new spendable amount assigned to an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub value: u64,
}

/// A candidate block as received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub height: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Computes `sha256hex(decimal(height) ++ concat(pad64(tx.id)))`.
    ///
    /// This is the block's self-declared identity. The hash input is the
    /// UTF-8 byte sequence of the decimal height followed by every
    /// transaction id, each padded to 64 characters, in block order.
    pub fn expected_id(&self) -> String {
        let mut preimage = String::with_capacity(16 + self.transactions.len() * TXID_WIDTH);
        preimage.push_str(&self.height.to_string());
        for tx in &self.transactions {
            preimage.push_str(&pad64(&tx.id));
        }

        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        utxoledger_util::bytes_to_hex(&hasher.finalize())
    }
}

impl Transaction {
    /// True iff at least one input's `txId` matches the coinbase marker.
    pub fn has_coinbase_input(&self) -> bool {
        self.inputs.iter().any(|i| is_coinbase_marker(&i.tx_id))
    }

    /// True iff every input's `txId` matches the coinbase marker.
    ///
    /// Meaningless for a transaction with no inputs; callers check
    /// `inputs.is_empty()` separately.
    pub fn all_inputs_coinbase(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(|i| is_coinbase_marker(&i.tx_id))
    }
}
