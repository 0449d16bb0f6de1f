//! `SQLite` connection management shared by the stores.
//!
//! `rusqlite::Connection` is `Send` but not `Sync`, so it cannot sit behind a
//! `RwLock` directly. The store keeps one writer connection and a small pool
//! of reader connections instead; callers pick one through [`with_writer`]
//! or [`with_reader`] while holding the store lock in the matching mode.
//!
//! [`with_writer`]: SqliteConnections::with_writer
//! [`with_reader`]: SqliteConnections::with_reader

use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::history::core::config::StorageConfig;
use crate::history::core::errors::{HistoryError, HistoryResult};

/// Writer plus pooled readers for one database.
pub struct SqliteConnections {
    target: String,
    busy_timeout: Duration,
    max_idle_readers: usize,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
}

impl SqliteConnections {
    /// Open the writer connection for `config`.
    ///
    /// An in-memory config gets a uniquely named shared-cache database so
    /// reader connections see the writer's data. The writer keeps that
    /// database alive for the lifetime of this value.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn open(config: &StorageConfig) -> HistoryResult<Self> {
        let target = if config.is_in_memory() {
            format!("file:chat_history_{}?mode=memory&cache=shared", Uuid::new_v4().simple())
        } else {
            config.sqlite_path.to_string_lossy().into_owned()
        };
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

        let writer = Self::connect(&target, busy_timeout)?;
        if !config.is_in_memory() {
            let mode: String =
                writer.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            // Commits must reach disk before the store lock is released.
            writer.pragma_update(None, "synchronous", "FULL")?;
            debug!("sqlite journal mode: {mode}");
        }
        debug!("Opened sqlite writer connection on {target}");

        Ok(Self {
            target,
            busy_timeout,
            max_idle_readers: config.max_idle_readers,
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
        })
    }

    fn connect(target: &str, busy_timeout: Duration) -> HistoryResult<Connection> {
        // Default flags include SQLITE_OPEN_URI, which the memory target needs.
        let conn = Connection::open(target)?;
        conn.busy_timeout(busy_timeout)?;
        Ok(conn)
    }

    /// Run `f` on the writer connection.
    ///
    /// # Errors
    /// Propagates the error returned by `f`, or `LockPoisoned`.
    pub fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> HistoryResult<T>,
    ) -> HistoryResult<T> {
        let mut conn = self.writer.lock().map_err(|_| HistoryError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Run `f` on a pooled reader connection, opening one if the pool is empty.
    ///
    /// # Errors
    /// Propagates the error returned by `f`, connection errors, or `LockPoisoned`.
    pub fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> HistoryResult<T>) -> HistoryResult<T> {
        let pooled = self
            .readers
            .lock()
            .map_err(|_| HistoryError::LockPoisoned)?
            .pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => Self::connect(&self.target, self.busy_timeout)?,
        };

        let result = f(&conn);

        let mut idle = self.readers.lock().map_err(|_| HistoryError::LockPoisoned)?;
        if idle.len() < self.max_idle_readers {
            idle.push(conn);
        }
        result
    }
}
