//! The three indexing engines (C3, C4, C5): block validation and ingestion,
//! rollback, and balance lookups, all operating against an injected
//! `Arc<dyn UtxoStore>`.

pub mod balance;
pub mod error;
pub mod ingest;
pub mod rollback;

pub use balance::get_balance;
pub use error::IndexerError;
pub use ingest::process_block;
pub use rollback::rollback_to_height;
