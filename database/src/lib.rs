//! SQLite-backed [`UtxoStore`] (C8): the production backing store for the
//! UTXO ledger indexer.
//!
//! A single `rusqlite::Connection` behind a `tokio::sync::Mutex` is enough
//! here: the Serialization Gate already limits writers to one at a time,
//! and SQLite serializes access to a single connection on its own, so a
//! connection pool would add complexity without adding throughput.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tokio::sync::Mutex;

use utxoledger_core::{OutPoint, UtxoRecord};
use utxoledger_store::{StoreError, UtxoStore};

/// Errors specific to opening or migrating the SQLite database. Once open,
/// all query failures surface as [`StoreError::Backend`].
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid database url: {0}")]
    InvalidUrl(String),
}

fn backend_error(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// SQLite-backed UTXO store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if necessary) the database at `path` and ensures the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::create_schema(&conn)?;
        info!("opened sqlite database at {}", path.display());
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a `DATABASE_URL`-style value. Supports `sqlite://<path>` and a
    /// bare filesystem path; `:memory:` opens a private in-memory database.
    pub fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let path = database_url
            .strip_prefix("sqlite://")
            .unwrap_or(database_url);
        if path == ":memory:" {
            let conn = Connection::open_in_memory()?;
            Self::create_schema(&conn)?;
            info!("opened in-memory sqlite database");
            return Ok(SqliteStore {
                conn: Mutex::new(conn),
            });
        }
        if path.is_empty() {
            error!("rejecting empty database url");
            return Err(DatabaseError::InvalidUrl(database_url.to_string()));
        }
        Self::open(path)
    }

    fn create_schema(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS utxos (
                txid TEXT NOT NULL,
                vout INTEGER NOT NULL,
                address TEXT NOT NULL,
                value INTEGER NOT NULL,
                block_height INTEGER NOT NULL,
                spent INTEGER NOT NULL DEFAULT 0,
                spent_txid TEXT,
                spent_at TEXT,
                script_pubkey TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                PRIMARY KEY (txid, vout)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_utxos_address ON utxos(address) WHERE spent = 0",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_utxos_spent_txid ON utxos(spent_txid)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_utxos_height ON utxos(block_height)",
            [],
        )?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<UtxoRecord> {
    let spent_at: Option<String> = row.get("spent_at")?;
    let created_at: String = row.get("created_at")?;
    Ok(UtxoRecord {
        txid: row.get("txid")?,
        vout: row.get("vout")?,
        address: row.get("address")?,
        value: row.get::<_, i64>("value")? as u64,
        block_height: row.get::<_, i64>("block_height")? as u64,
        spent: row.get::<_, i64>("spent")? != 0,
        spent_txid: row.get("spent_txid")?,
        spent_at: spent_at.map(|s| parse_timestamp(&s)),
        script_pubkey: row.get("script_pubkey")?,
        created_at: parse_timestamp(&created_at),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::from_str(s).unwrap_or_else(|_| Utc::now())
}

fn insert_row(conn: &Connection, record: &UtxoRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO utxos
         (txid, vout, address, value, block_height, spent, spent_txid, spent_at, script_pubkey, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, NULL, ?6, ?7)",
        params![
            record.txid,
            record.vout,
            record.address,
            record.value as i64,
            record.block_height as i64,
            record.script_pubkey,
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn mark_spent_row(
    conn: &Connection,
    outpoint: &OutPoint,
    spending_txid: &str,
) -> Result<(), StoreError> {
    let updated = conn
        .execute(
            "UPDATE utxos SET spent = 1, spent_txid = ?1, spent_at = ?2
             WHERE txid = ?3 AND vout = ?4 AND spent = 0",
            params![
                spending_txid,
                Utc::now().to_rfc3339(),
                outpoint.txid,
                outpoint.vout,
            ],
        )
        .map_err(backend_error)?;
    if updated == 0 {
        warn!("mark_spent found no unspent utxo at {}:{}", outpoint.txid, outpoint.vout);
        return Err(StoreError::NotFound(format!(
            "{}:{}",
            outpoint.txid, outpoint.vout
        )));
    }
    debug!("marked utxo {}:{} spent by {}", outpoint.txid, outpoint.vout, spending_txid);
    Ok(())
}

fn unspend_rows(conn: &Connection, ids: &[String]) -> rusqlite::Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        "UPDATE utxos SET spent = 0, spent_txid = NULL, spent_at = NULL
         WHERE spent = 1 AND spent_txid IN ({placeholders})"
    );
    let params: Vec<&dyn rusqlite::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
    conn.execute(&sql, params.as_slice())?;
    Ok(())
}

fn delete_above_rows(conn: &Connection, height: u64) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM utxos WHERE block_height > ?1",
        params![height as i64],
    )?;
    Ok(())
}

#[async_trait]
impl UtxoStore for SqliteStore {
    async fn insert(&self, record: UtxoRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        insert_row(&conn, &record).map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                warn!("insert rejected, outpoint already exists: {}:{}", record.txid, record.vout);
                StoreError::AlreadyExists(format!("{}:{}", record.txid, record.vout))
            }
            other => {
                error!("insert failed for {}:{}: {}", record.txid, record.vout, other);
                backend_error(other)
            }
        })
    }

    async fn find_unspent(&self, refs: &[OutPoint]) -> Result<Vec<UtxoRecord>, StoreError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM utxos WHERE txid = ?1 AND vout = ?2 AND spent = 0")
            .map_err(backend_error)?;

        let mut found = Vec::with_capacity(refs.len());
        for r in refs {
            if let Some(record) = stmt
                .query_row(params![r.txid, r.vout], row_to_record)
                .optional()
                .map_err(backend_error)?
            {
                found.push(record);
            }
        }
        Ok(found)
    }

    async fn mark_spent(&self, outpoint: &OutPoint, spending_txid: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        mark_spent_row(&conn, outpoint, spending_txid)
    }

    async fn balance(&self, address: &str) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        let total: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(value), 0) FROM utxos WHERE address = ?1 AND spent = 0",
                params![address],
                |row| row.get(0),
            )
            .map_err(backend_error)?;
        Ok(total as u64)
    }

    async fn tip(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        let height: Option<i64> = conn
            .query_row("SELECT MAX(block_height) FROM utxos", [], |row| row.get(0))
            .map_err(backend_error)?;
        Ok(height.unwrap_or(0) as u64)
    }

    async fn find_above(&self, height: u64) -> Result<Vec<UtxoRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM utxos WHERE block_height > ?1")
            .map_err(backend_error)?;
        let rows = stmt
            .query_map(params![height as i64], row_to_record)
            .map_err(backend_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend_error)?;
        Ok(rows)
    }

    async fn unspend_by_spending_txids(&self, ids: &[String]) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        unspend_rows(&conn, ids).map_err(backend_error)
    }

    async fn delete_above(&self, height: u64) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        delete_above_rows(&conn, height).map_err(backend_error)
    }

    async fn apply_block(
        &self,
        spends: &[(OutPoint, String)],
        outputs: &[UtxoRecord],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(backend_error)?;
        for (outpoint, spending_txid) in spends {
            mark_spent_row(&tx, outpoint, spending_txid)?;
        }
        for record in outputs {
            insert_row(&tx, record).map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    warn!("apply_block rejected, outpoint already exists: {}:{}", record.txid, record.vout);
                    StoreError::AlreadyExists(format!("{}:{}", record.txid, record.vout))
                }
                other => {
                    error!("apply_block insert failed for {}:{}: {}", record.txid, record.vout, other);
                    backend_error(other)
                }
            })?;
        }
        tx.commit().map_err(backend_error)?;
        debug!("applied block: {} spend(s), {} output(s)", spends.len(), outputs.len());
        Ok(())
    }

    async fn apply_rollback(
        &self,
        spending_txids: &[String],
        target_height: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(backend_error)?;
        unspend_rows(&tx, spending_txids).map_err(backend_error)?;
        delete_above_rows(&tx, target_height).map_err(backend_error)?;
        tx.commit().map_err(backend_error)?;
        info!("rolled back to height {}, unspent {} transaction(s)", target_height, spending_txids.len());
        Ok(())
    }
}
