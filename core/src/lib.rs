//! Core types for the UTXO ledger indexer: wire-format blocks and
//! transactions, and the persisted UTXO record they produce.

pub mod block;
pub mod utxo;

pub use block::{is_coinbase_marker, pad64, Block, Input, Output, Transaction, TXID_WIDTH};
pub use utxo::{OutPoint, Txid, UtxoRecord};
