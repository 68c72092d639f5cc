//! Error taxonomy for the three indexing engines (C3, C4, C5).

use thiserror::Error;
use utxoledger_store::StoreError;

/// Failure kinds surfaced by block ingestion, rollback, and balance lookups.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("invalid block height: expected {expected}, got {observed}")]
    InvalidBlockHeight { observed: u64, expected: u64 },

    #[error("invalid input/output sum: {0}")]
    InvalidInputOutputSum(String),

    #[error("invalid block id: expected {expected}, got {actual}")]
    InvalidBlockId { expected: String, actual: String },

    #[error("invalid rollback height: {0}")]
    InvalidRollbackHeight(String),

    #[error("{0}")]
    NoBlocksToRollback(String),

    #[error("database error: {0}")]
    Database(#[from] StoreError),
}
