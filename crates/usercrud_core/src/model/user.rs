//! User domain model.
//!
//! # Responsibility
//! - Define the only persisted record type.
//! - Stamp creation time once, at construction.
//!
//! # Invariants
//! - `id` is `None` until the first successful save and stable afterwards.
//! - `created_at` is never mutated; successive `User::new` calls produce
//!   strictly increasing values.
//! - `email` uniqueness is enforced by storage, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Storage-assigned identifier.
pub type UserId = i64;

static LAST_CREATED_AT_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Option<UserId>,
    pub name: String,
    pub email: String,
    /// Within `0..=150` when set.
    pub age: Option<i32>,
    created_at: DateTime<Utc>,
}

impl User {
    /// Creates a not-yet-persisted user stamped with the current time.
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: Option<i32>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            age,
            created_at: next_created_at(),
        }
    }

    /// Rebuilds a record from stored field values.
    ///
    /// Used by row mapping; does not validate field contents.
    pub fn from_parts(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        age: Option<i32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            email: email.into(),
            age,
            created_at,
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns whether storage has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Binds the storage-assigned id. First assignment wins.
    pub(crate) fn assign_id(&mut self, id: UserId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "User(id=")?;
        match self.id {
            Some(id) => write!(f, "{id}")?,
            None => write!(f, "none")?,
        }
        write!(f, ", name='{}', email='{}', age=", self.name, self.email)?;
        match self.age {
            Some(age) => write!(f, "{age}")?,
            None => write!(f, "none")?,
        }
        write!(f, ", created_at={})", self.created_at.to_rfc3339())
    }
}

/// Returns a wall-clock timestamp strictly after any previously issued one.
///
/// Truncated to microseconds so stored values round-trip exactly.
fn next_created_at() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let mut previous = LAST_CREATED_AT_MICROS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(previous.saturating_add(1));
        match LAST_CREATED_AT_MICROS.compare_exchange_weak(
            previous,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return DateTime::from_timestamp_micros(candidate).unwrap_or_else(Utc::now),
            Err(actual) => previous = actual,
        }
    }
}
