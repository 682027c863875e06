//! Schema upgrades for the user store.
//!
//! # Responsibility
//! - List the SQL steps that build the `users` schema, oldest first.
//! - Bring an opened database up to the newest step inside one transaction.
//!
//! # Invariants
//! - Steps are numbered 1, 2, 3, ... with no gaps.
//! - The number of the last applied step is kept in `PRAGMA user_version`.
//! - A database stamped with a newer step than this build knows is refused
//!   untouched.

use crate::db::{DbError, DbResult};
use log::{info, warn};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "users",
    sql: include_str!("0001_users.sql"),
}];

/// Returns the newest schema version this build can produce.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Upgrades `conn` to [`latest_version`].
///
/// A no-op when the schema is already current.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stamped = stamped_version(conn)?;
    let latest = latest_version();

    if stamped > latest {
        warn!(
            "event=db_migrate module=db status=error error_code=schema_too_new db_version={stamped} latest_supported={latest}"
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stamped,
            latest_supported: latest,
        });
    }
    if stamped == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending_steps(stamped) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    Ok(())
}

fn pending_steps(stamped: u32) -> impl Iterator<Item = &'static SchemaStep> {
    SCHEMA_STEPS.iter().filter(move |step| step.version > stamped)
}

fn stamped_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
