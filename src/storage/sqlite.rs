//! SQLite storage implementation.
//!
//! One `bills` table keyed by an auto-assigned id, with the natural key
//! `(type, number)` enforced by a unique constraint. Runs in WAL mode when
//! backed by a file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};

use crate::error::{AppError, Result};
use crate::models::{Bill, BillKey, BillRecord, BillType};
use crate::storage::{BillStore, StoreStats};

const BILL_COLUMNS: &str =
    "id, type, number, sponsor, title, full_url, short_url, introduced, updated, posted, skipped";

impl ToSql for BillType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for BillType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

/// Create the `bills` table if it does not exist yet.
pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bills (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            type       TEXT    NOT NULL,
            number     INTEGER NOT NULL,
            sponsor    TEXT    NOT NULL,
            title      TEXT    NOT NULL,
            full_url   TEXT    NOT NULL,
            short_url  TEXT,
            introduced DATE,
            updated    DATE,
            posted     BOOLEAN NOT NULL DEFAULT 0,
            skipped    BOOLEAN NOT NULL DEFAULT 0,
            UNIQUE (type, number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bills_pending ON bills(posted, skipped, id)",
        [],
    )?;

    Ok(())
}

fn bill_from_row(row: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: row.get(0)?,
        key: BillKey::new(row.get(1)?, row.get(2)?),
        sponsor: row.get(3)?,
        title: row.get(4)?,
        full_url: row.get(5)?,
        short_url: row.get(6)?,
        introduced: row.get(7)?,
        updated: row.get(8)?,
        posted: row.get(9)?,
        skipped: row.get(10)?,
    })
}

/// Bill store backed by a single SQLite connection.
pub struct SqliteBillStore {
    conn: Mutex<Connection>,
}

impl SqliteBillStore {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::store("connection lock poisoned"))
    }

    /// Run a single-row status update in a transaction, rolling back unless
    /// exactly one row changed.
    fn update_one(&self, sql: &str, key: &BillKey, action: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(sql, params![key.bill_type, key.number])?;
        if changed != 1 {
            // dropping `tx` rolls back
            return Err(AppError::consistency(format!(
                "{action} {key} affected {changed} rows, expected 1"
            )));
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl BillStore for SqliteBillStore {
    async fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn upsert_if_absent(&self, record: &BillRecord) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO bills (type, number, sponsor, title, full_url, introduced, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.key.bill_type,
                record.key.number,
                record.sponsor,
                record.title,
                record.full_url,
                record.introduced,
                record.updated,
            ],
        )?;
        Ok(inserted == 1)
    }

    async fn set_short_url(&self, key: &BillKey, short_url: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE bills SET short_url = ?1
             WHERE type = ?2 AND number = ?3 AND short_url IS NULL AND posted = 0",
            params![short_url, key.bill_type, key.number],
        )?;
        Ok(())
    }

    async fn select_one_unposted(&self) -> Result<Option<Bill>> {
        let conn = self.conn()?;
        let bill = conn
            .query_row(
                &format!(
                    "SELECT {BILL_COLUMNS} FROM bills
                     WHERE posted = 0 AND skipped = 0
                     ORDER BY id ASC LIMIT 1"
                ),
                [],
                bill_from_row,
            )
            .optional()?;
        Ok(bill)
    }

    async fn mark_posted(&self, key: &BillKey) -> Result<()> {
        self.update_one(
            "UPDATE bills SET posted = 1 WHERE type = ?1 AND number = ?2 AND posted = 0",
            key,
            "mark_posted",
        )
    }

    async fn mark_skipped(&self, key: &BillKey) -> Result<()> {
        self.update_one(
            "UPDATE bills SET skipped = 1
             WHERE type = ?1 AND number = ?2 AND posted = 0 AND skipped = 0",
            key,
            "mark_skipped",
        )
    }

    async fn list_unshortened(&self) -> Result<Vec<Bill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BILL_COLUMNS} FROM bills
             WHERE short_url IS NULL AND posted = 0 AND skipped = 0
             ORDER BY id ASC"
        ))?;
        let bills = stmt
            .query_map([], bill_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bills)
    }

    async fn find(&self, key: &BillKey) -> Result<Option<Bill>> {
        let conn = self.conn()?;
        let bill = conn
            .query_row(
                &format!("SELECT {BILL_COLUMNS} FROM bills WHERE type = ?1 AND number = ?2"),
                params![key.bill_type, key.number],
                bill_from_row,
            )
            .optional()?;
        Ok(bill)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(posted), 0),
                    COALESCE(SUM(CASE WHEN posted = 0 AND skipped = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(skipped), 0),
                    COALESCE(SUM(CASE WHEN posted = 0 AND skipped = 0 AND short_url IS NULL
                                      THEN 1 ELSE 0 END), 0)
             FROM bills",
            [],
            |row| {
                Ok(StoreStats {
                    total: row.get::<_, i64>(0)? as u64,
                    posted: row.get::<_, i64>(1)? as u64,
                    pending: row.get::<_, i64>(2)? as u64,
                    skipped: row.get::<_, i64>(3)? as u64,
                    unshortened: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}
