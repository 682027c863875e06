//! Scoped per-operation access to the managed connection.

use super::{DbError, DbResult};
use log::trace;
use rusqlite::{Connection, Transaction};
use std::sync::MutexGuard;
use std::time::Instant;

/// One operation's exclusive handle on the connector.
///
/// Dropping the session releases the connection back to the connector.
pub struct Session<'db> {
    guard: MutexGuard<'db, Option<Connection>>,
    acquired_at: Instant,
}

impl<'db> Session<'db> {
    pub(super) fn new(guard: MutexGuard<'db, Option<Connection>>) -> Self {
        trace!("event=session_acquire module=db status=ok");
        Self {
            guard,
            acquired_at: Instant::now(),
        }
    }

    /// Borrows the connection for statements outside a transaction.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.guard.as_ref().ok_or(DbError::Unavailable)
    }

    /// Starts a deferred transaction.
    ///
    /// The transaction rolls back on drop unless committed.
    pub fn begin(&mut self) -> DbResult<Transaction<'_>> {
        let conn = self.guard.as_mut().ok_or(DbError::Unavailable)?;
        Ok(conn.transaction()?)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        trace!(
            "event=session_release module=db status=ok held_us={}",
            self.acquired_at.elapsed().as_micros()
        );
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.guard.is_some())
            .finish()
    }
}
