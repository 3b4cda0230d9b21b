//! # keywatch-sqlite
//!
//! SQLite [`StorageBackend`] for keywatch.
//!
//! Owns a dedicated OS thread that holds the `rusqlite::Connection`. All
//! async callers send [`DbCommand`] messages via
//! `std::sync::mpsc::sync_channel` and await a `tokio::sync::oneshot`
//! reply. The async executor is never blocked; the writer thread is never
//! awaited.
//!
//! **Runtime requirement:** a Tokio runtime, for the `oneshot` reply
//! channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keywatch_core::{ChangeBus, Store};
//! use keywatch_sqlite::SqliteBackend;
//!
//! let backend = Arc::new(SqliteBackend::new("./data/state.db")?);
//! let store = Store::new(backend, ChangeBus::new());
//! ```

use std::path::Path;

use keywatch_core::{BoxFuture, StorageBackend, StoreError};
use rusqlite::{params, Connection};

// ---------------------------------------------------------------------------
// Command enum — sent from async callers to the writer thread
// ---------------------------------------------------------------------------

enum DbCommand {
    Read {
        key: String,
        reply: tokio::sync::oneshot::Sender<Result<Option<String>, StoreError>>,
    },
    Write {
        key: String,
        text: String,
        reply: tokio::sync::oneshot::Sender<Result<(), StoreError>>,
    },
    Delete {
        key: String,
        reply: tokio::sync::oneshot::Sender<Result<(), StoreError>>,
    },
}

// ---------------------------------------------------------------------------
// SqliteBackend — the public API
// ---------------------------------------------------------------------------

/// SQLite key-value storage backend.
///
/// `Clone` is cheap — it only clones the `mpsc::SyncSender` handle.
///
/// The writer thread shuts down automatically when all `SyncSender`
/// handles (i.e. all `SqliteBackend` clones) are dropped. Operations
/// issued after shutdown fail with the corresponding read/write error.
#[derive(Clone)]
pub struct SqliteBackend {
    tx: std::sync::mpsc::SyncSender<DbCommand>,
}

impl SqliteBackend {
    /// Opens (or creates) a SQLite database at `path` and starts the
    /// writer thread.
    ///
    /// Schema and WAL mode are configured synchronously here — no async
    /// runtime is required at construction time.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Write(e.to_string()))?;

        // Enable WAL mode: readers and the single writer proceed concurrently.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Write(e.to_string()))?;

        Self::with_connection(conn)
    }

    /// Backend over an in-memory database that lives as long as the
    /// writer thread. Intended for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Write(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        // Initialize schema before the writer thread is spawned.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::Write(e.to_string()))?;

        // Bound of 64 provides backpressure without being too aggressive.
        let (tx, rx) = std::sync::mpsc::sync_channel::<DbCommand>(64);

        std::thread::Builder::new()
            .name("keywatch-sqlite".to_string())
            .spawn(move || run_db_thread(conn, rx))
            .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(Self { tx })
    }
}

// ---------------------------------------------------------------------------
// Writer thread — blocking event loop
// ---------------------------------------------------------------------------

fn run_db_thread(conn: Connection, rx: std::sync::mpsc::Receiver<DbCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            DbCommand::Read { key, reply } => {
                let result = conn
                    .prepare_cached("SELECT value FROM kv_store WHERE key = ?1")
                    .and_then(|mut stmt| {
                        stmt.query_row(params![key], |row| row.get::<_, String>(0))
                            .map(Some)
                            .or_else(|e| match e {
                                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                                other => Err(other),
                            })
                    })
                    .map_err(|e| StoreError::Read(e.to_string()));
                let _ = reply.send(result);
            }

            DbCommand::Write { key, text, reply } => {
                let result = conn
                    .prepare_cached(
                        "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    )
                    .and_then(|mut stmt| stmt.execute(params![key, text]))
                    .map(|_| ())
                    .map_err(|e| StoreError::Write(e.to_string()));
                let _ = reply.send(result);
            }

            DbCommand::Delete { key, reply } => {
                let result = conn
                    .prepare_cached("DELETE FROM kv_store WHERE key = ?1")
                    .and_then(|mut stmt| stmt.execute(params![key]))
                    .map(|_| ())
                    .map_err(|e| StoreError::Write(e.to_string()));
                let _ = reply.send(result);
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("keywatch-sqlite writer thread stopping (all handles dropped)");
    // All SyncSender handles dropped → exit cleanly.
}

// ---------------------------------------------------------------------------
// send_cmd! macro — enqueue + await oneshot
// ---------------------------------------------------------------------------

macro_rules! send_cmd {
    ($tx:expr, $cmd:expr, $shutdown_err:expr) => {{
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        $tx.send($cmd(reply_tx))
            .map_err(|_| $shutdown_err("sqlite backend has shut down".to_string()))?;
        reply_rx
            .await
            .map_err(|_| $shutdown_err("sqlite backend has shut down".to_string()))?
    }};
}

// ---------------------------------------------------------------------------
// StorageBackend impl
// ---------------------------------------------------------------------------

impl StorageBackend for SqliteBackend {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            send_cmd!(
                self.tx,
                |reply| DbCommand::Read { key, reply },
                StoreError::Read
            )
        })
    }

    fn write<'a>(&'a self, key: &'a str, text: String) -> BoxFuture<'a, Result<(), StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            send_cmd!(
                self.tx,
                |reply| DbCommand::Write { key, text, reply },
                StoreError::Write
            )
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            send_cmd!(
                self.tx,
                |reply| DbCommand::Delete { key, reply },
                StoreError::Write
            )
        })
    }
}
