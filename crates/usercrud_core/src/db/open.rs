//! Connection bootstrap and lifecycle for the SQLite connector.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before the connector becomes usable.
//! - Close the connection exactly once on shutdown.
//!
//! # Invariants
//! - A constructed `Database` always has migrations fully applied.
//! - `shutdown` is idempotent; sessions requested afterwards fail with
//!   `DbError::Unavailable`.

use super::migrations::apply_migrations;
use super::session::Session;
use super::{DbError, DbResult};
use crate::config::DatabaseConfig;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle-managed SQLite connector.
///
/// Owned by the process entry point and lent to repositories. Access to the
/// underlying connection is serialized, so one session is live at a time.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Option<Connection>>,
    mode: &'static str,
}

impl Database {
    /// Opens a SQLite database file and applies all pending migrations.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        Self::open_with("file", DEFAULT_BUSY_TIMEOUT, || Connection::open(path))
    }

    /// Opens a private in-memory database and applies all pending migrations.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_with("memory", DEFAULT_BUSY_TIMEOUT, Connection::open_in_memory)
    }

    /// Opens the database described by process configuration.
    ///
    /// `path = ":memory:"` selects an in-memory database.
    pub fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        if config.is_in_memory() {
            Self::open_with("memory", busy_timeout, Connection::open_in_memory)
        } else {
            let path = config.path.as_path();
            Self::open_with("file", busy_timeout, || Connection::open(path))
        }
    }

    fn open_with(
        mode: &'static str,
        busy_timeout: Duration,
        opener: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode={mode}");

        let mut conn = match opener() {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        if let Err(err) = bootstrap_connection(&mut conn, busy_timeout) {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            mode,
        })
    }

    /// Acquires a session scoped to one operation.
    ///
    /// The session is released when dropped, on success and error paths alike.
    /// Holding two sessions on one thread deadlocks.
    ///
    /// # Errors
    /// - `DbError::Unavailable` after `shutdown`.
    pub fn acquire_session(&self) -> DbResult<Session<'_>> {
        let guard = self.lock();
        if guard.is_none() {
            debug!("event=session_acquire module=db status=error error_code=unavailable");
            return Err(DbError::Unavailable);
        }
        Ok(Session::new(guard))
    }

    /// Returns whether sessions can still be acquired.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Closes the underlying connection.
    ///
    /// Safe to call repeatedly; only the first call has an effect.
    pub fn shutdown(&self) {
        let Some(conn) = self.lock().take() else {
            debug!("event=db_shutdown module=db status=skipped reason=already_closed");
            return;
        };

        info!("event=db_shutdown module=db status=start mode={}", self.mode);
        match conn.close() {
            Ok(()) => info!("event=db_shutdown module=db status=ok mode={}", self.mode),
            Err((_conn, err)) => warn!(
                "event=db_shutdown module=db status=error mode={} error={}",
                self.mode, err
            ),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic while a session was held leaves the connection itself intact.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
