//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the per-call persistence operations over the `users` table.
//! - Keep SQL and transaction handling inside the persistence boundary.
//!
//! # Invariants
//! - Every call is its own unit of work: one session, one transaction, one
//!   statement, commit on success and rollback on failure.
//! - The session is released on every exit path.
//! - Name search is a case-sensitive substring match.
//! - `created_at` is written at insert and never touched by updates.

use crate::db::{Database, DbError};
use crate::model::user::{User, UserId};
use chrono::DateTime;
use log::{debug, error, info, warn};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    age,
    created_at
FROM users";

const USER_RETURNING_SQL: &str = "RETURNING id, name, email, age, created_at";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for user persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Any failure surfaced by the database, tagged with the failed operation.
    Storage {
        operation: &'static str,
        source: DbError,
    },
    /// Another row already owns this email.
    DuplicateEmail(String),
    /// Update target does not exist (any more).
    NotFound(UserId),
    /// Update was called with a record that was never saved.
    MissingId,
    /// Save was called with a record that already has an id.
    AlreadyPersisted(UserId),
    InvalidData(String),
}

impl RepoError {
    /// Returns whether the connector was closed when the call was made.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Storage { source, .. } if source.is_unavailable())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { operation, source } => write!(f, "user {operation} failed: {source}"),
            Self::DuplicateEmail(email) => write!(f, "email already in use: {email}"),
            Self::NotFound(id) => write!(f, "user not found with id: {id}"),
            Self::MissingId => write!(f, "user has no id; save it before updating"),
            Self::AlreadyPersisted(id) => write!(f, "user already persisted with id: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted user data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Storage {
            operation: "statement",
            source: value,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Repository interface for user CRUD and lookups.
pub trait UserRepository {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Returns all users ordered by id.
    fn find_all(&self) -> RepoResult<Vec<User>>;
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Returns users whose name contains `fragment`, case-sensitively.
    fn find_by_name_contains(&self, fragment: &str) -> RepoResult<Vec<User>>;
    /// Inserts a new user and returns it with the assigned id.
    fn save(&self, user: User) -> RepoResult<User>;
    /// Overwrites name/email/age of an existing user and returns the stored row.
    fn update(&self, user: User) -> RepoResult<User>;
    /// Removes a user. Missing ids are not an error.
    fn delete(&self, id: UserId) -> RepoResult<()>;
}

impl<R: UserRepository + ?Sized> UserRepository for &R {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        (**self).find_by_id(id)
    }

    fn find_all(&self) -> RepoResult<Vec<User>> {
        (**self).find_all()
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        (**self).find_by_email(email)
    }

    fn find_by_name_contains(&self, fragment: &str) -> RepoResult<Vec<User>> {
        (**self).find_by_name_contains(fragment)
    }

    fn save(&self, user: User) -> RepoResult<User> {
        (**self).save(user)
    }

    fn update(&self, user: User) -> RepoResult<User> {
        (**self).update(user)
    }

    fn delete(&self, id: UserId) -> RepoResult<()> {
        (**self).delete(id)
    }
}

/// SQLite-backed user repository over an injected connector.
#[derive(Debug)]
pub struct SqliteUserRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteUserRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Runs `work` as one unit of work.
    ///
    /// Commits when `work` succeeds; otherwise rolls back and returns the
    /// error tagged with `operation`. The session is released before this
    /// returns, whatever the outcome.
    fn in_transaction<T>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let outcome = self
            .db
            .acquire_session()
            .map_err(RepoError::from)
            .and_then(|mut session| {
                let tx = session.begin()?;
                let result = work(&tx);
                match result {
                    Ok(value) => {
                        tx.commit()?;
                        Ok(value)
                    }
                    Err(err) => {
                        if let Err(rollback_err) = tx.rollback() {
                            warn!(
                                "event=user_repo module=repo op={operation} status=rollback_failed error={rollback_err}"
                            );
                        }
                        Err(err)
                    }
                }
            });

        match outcome {
            Ok(value) => {
                debug!(
                    "event=user_repo module=repo op={operation} status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                let err = tag_error(operation, err);
                error!(
                    "event=user_repo module=repo op={operation} status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self.in_transaction("find_by_id", |tx| {
            let mut stmt = tx.prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
            let mut rows = stmt.query([id])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(parse_user_row(row)?));
            }
            Ok(None)
        })?;

        info!(
            "event=user_find_by_id module=repo id={id} found={}",
            user.is_some()
        );
        Ok(user)
    }

    fn find_all(&self) -> RepoResult<Vec<User>> {
        let users = self.in_transaction("find_all", |tx| {
            let mut stmt = tx.prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
            let rows = stmt.query([])?;
            collect_users(rows)
        })?;

        info!("event=user_find_all module=repo count={}", users.len());
        Ok(users)
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = self.in_transaction("find_by_email", |tx| {
            let mut stmt = tx.prepare(&format!("{USER_SELECT_SQL} WHERE email = ?1;"))?;
            let mut rows = stmt.query([email])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(parse_user_row(row)?));
            }
            Ok(None)
        })?;

        info!(
            "event=user_find_by_email module=repo found={}",
            user.is_some()
        );
        Ok(user)
    }

    fn find_by_name_contains(&self, fragment: &str) -> RepoResult<Vec<User>> {
        // `instr` is case-sensitive, unlike SQLite's ASCII-folding LIKE.
        let users = self.in_transaction("find_by_name", |tx| {
            let mut stmt = tx.prepare(&format!(
                "{USER_SELECT_SQL} WHERE instr(name, ?1) > 0 ORDER BY id ASC;"
            ))?;
            let rows = stmt.query([fragment])?;
            collect_users(rows)
        })?;

        info!(
            "event=user_find_by_name module=repo count={}",
            users.len()
        );
        Ok(users)
    }

    fn save(&self, user: User) -> RepoResult<User> {
        if let Some(id) = user.id() {
            return Err(RepoError::AlreadyPersisted(id));
        }

        let mut user = user;
        let id = self.in_transaction("save", |tx| {
            tx.query_row(
                "INSERT INTO users (name, email, age, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id;",
                params![
                    user.name.as_str(),
                    user.email.as_str(),
                    user.age,
                    user.created_at().timestamp_micros(),
                ],
                |row| row.get::<_, UserId>(0),
            )
            .map_err(|err| write_error(err, &user.email))
        })?;
        user.assign_id(id);

        info!("event=user_save module=repo status=ok id={id}");
        Ok(user)
    }

    fn update(&self, user: User) -> RepoResult<User> {
        let id = user.id().ok_or(RepoError::MissingId)?;

        let updated = self.in_transaction("update", |tx| {
            let row = tx
                .query_row(
                    &format!(
                        "UPDATE users
                         SET
                            name = ?1,
                            email = ?2,
                            age = ?3
                         WHERE id = ?4
                         {USER_RETURNING_SQL};"
                    ),
                    params![user.name.as_str(), user.email.as_str(), user.age, id],
                    RawUserRow::read,
                )
                .optional()
                .map_err(|err| write_error(err, &user.email))?;

            match row {
                Some(raw) => raw.into_user(),
                None => Err(RepoError::NotFound(id)),
            }
        })?;

        info!("event=user_update module=repo status=ok id={id}");
        Ok(updated)
    }

    fn delete(&self, id: UserId) -> RepoResult<()> {
        let removed = self.in_transaction("delete", |tx| {
            Ok(tx.execute("DELETE FROM users WHERE id = ?1;", [id])?)
        })?;

        if removed == 0 {
            warn!("event=user_delete module=repo status=skipped reason=not_found id={id}");
        } else {
            info!("event=user_delete module=repo status=ok id={id}");
        }
        Ok(())
    }
}

/// Column values exactly as stored, before domain conversion.
struct RawUserRow {
    id: UserId,
    name: String,
    email: String,
    age: Option<i32>,
    created_at_micros: i64,
}

impl RawUserRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            age: row.get("age")?,
            created_at_micros: row.get("created_at")?,
        })
    }

    fn into_user(self) -> RepoResult<User> {
        let created_at = DateTime::from_timestamp_micros(self.created_at_micros).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid created_at value `{}` in users.created_at",
                self.created_at_micros
            ))
        })?;
        Ok(User::from_parts(
            self.id,
            self.name,
            self.email,
            self.age,
            created_at,
        ))
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    RawUserRow::read(row)?.into_user()
}

fn collect_users(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<User>> {
    let mut users = Vec::new();
    while let Some(row) = rows.next()? {
        users.push(parse_user_row(row)?);
    }
    Ok(users)
}

fn write_error(err: rusqlite::Error, email: &str) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::DuplicateEmail(email.to_string())
    } else {
        err.into()
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn tag_error(operation: &'static str, err: RepoError) -> RepoError {
    match err {
        RepoError::Storage { source, .. } => RepoError::Storage { operation, source },
        other => other,
    }
}
