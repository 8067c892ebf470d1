mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

pub use schema::{FTS_TABLE, REQUIRED_TABLES};
use schema::{FTS_TABLE_CREATION, INITIAL_SCHEMA};

/// How long a connection waits for another writer before failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper providing connection management and schema initialization.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self { conn, path: None };
        db.initialize()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the parent directory and the database file if they do not
    /// exist, switches the file to WAL journaling, and initializes the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        ensure_parent_directory(path)?;

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened database");

        let db = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Creates every table, index, and the FTS table if absent.
    ///
    /// Safe to call repeatedly: existing structures and rows are left alone.
    /// All statements run in one transaction, so a failure leaves the
    /// previous schema untouched.
    pub fn initialize(&self) -> StoreResult<()> {
        let tx = self.write_transaction()?;
        tx.execute_batch(INITIAL_SCHEMA)?;

        // Check sqlite_master rather than relying on IF NOT EXISTS for the virtual table
        let fts_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [FTS_TABLE],
            |row| row.get(0),
        )?;
        if !fts_exists {
            tx.execute_batch(FTS_TABLE_CREATION)?;
            debug!("created full-text index table");
        }

        tx.commit()?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    ///
    /// Useful for executing custom queries in tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the database file path, or `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Begins a write transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so two connections
    /// writing the same tag queue behind each other instead of failing on
    /// lock upgrade. The transaction rolls back on drop unless committed.
    pub(crate) fn write_transaction(&self) -> StoreResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Begins a read transaction giving a consistent snapshot across statements.
    pub(crate) fn read_transaction(&self) -> StoreResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Deferred,
        )?)
    }
}

/// Ensures the parent directory of the database file exists.
fn ensure_parent_directory(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
