//! User use-case service.
//!
//! # Responsibility
//! - Validate caller input before delegating to the repository.
//! - Turn "entity absent" into `ServiceError::NotFound` where the operation
//!   requires an existing user (update, delete).
//!
//! # Invariants
//! - Invalid input never reaches the repository.
//! - Plain lookups return `Ok(None)` for absence; that is not an error.
//! - Text fields are checked after trimming but stored exactly as given.

use crate::model::user::{User, UserId};
use crate::repo::user_repo::{RepoError, UserRepository};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MIN_AGE: i32 = 0;
pub const MAX_AGE: i32 = 150;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Rejected caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingId,
    NonPositiveId(i64),
    EmptyName,
    EmptyEmail,
    /// Email has no `@`.
    InvalidEmail(String),
    AgeOutOfRange(i32),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId => write!(f, "user id is required"),
            Self::NonPositiveId(id) => write!(f, "user id must be positive, got {id}"),
            Self::EmptyName => write!(f, "name cannot be empty"),
            Self::EmptyEmail => write!(f, "email cannot be empty"),
            Self::InvalidEmail(email) => write!(f, "invalid email format: `{email}`"),
            Self::AgeOutOfRange(age) => {
                write!(f, "age must be between {MIN_AGE} and {MAX_AGE}, got {age}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Service error for user use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    /// Operation requires an existing user and none matches.
    NotFound(UserId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "user not found with id: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Validating facade over a user repository.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates input and persists a new user.
    ///
    /// Returns the stored record with its assigned id.
    pub fn create_user(&self, name: &str, email: &str, age: Option<i32>) -> ServiceResult<User> {
        validate_user_data(name, email, age)?;
        let user = self.repo.save(User::new(name, email, age))?;
        debug!("event=user_create module=service status=ok id={:?}", user.id());
        Ok(user)
    }

    /// Looks up one user. Absence is returned as `Ok(None)`.
    pub fn get_user_by_id(&self, id: impl Into<Option<UserId>>) -> ServiceResult<Option<User>> {
        let id = validate_id(id.into())?;
        Ok(self.repo.find_by_id(id)?)
    }

    pub fn get_all_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.repo.find_all()?)
    }

    /// Overwrites name, email and age of an existing user.
    ///
    /// Identity and `created_at` are kept from the stored record.
    pub fn update_user(
        &self,
        id: impl Into<Option<UserId>>,
        name: &str,
        email: &str,
        age: Option<i32>,
    ) -> ServiceResult<User> {
        let id = validate_id(id.into())?;
        validate_user_data(name, email, age)?;

        let mut user = self
            .repo
            .find_by_id(id)?
            .ok_or(ServiceError::NotFound(id))?;
        user.name = name.to_string();
        user.email = email.to_string();
        user.age = age;

        Ok(self.repo.update(user)?)
    }

    /// Deletes an existing user.
    ///
    /// The existence check and the delete run as separate units of work.
    pub fn delete_user(&self, id: impl Into<Option<UserId>>) -> ServiceResult<()> {
        let id = validate_id(id.into())?;
        if self.repo.find_by_id(id)?.is_none() {
            return Err(ServiceError::NotFound(id));
        }

        self.repo.delete(id)?;
        debug!("event=user_delete module=service status=ok id={id}");
        Ok(())
    }

    /// Exact-match email lookup.
    pub fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        if email.trim().is_empty() {
            return Err(ValidationError::EmptyEmail.into());
        }
        Ok(self.repo.find_by_email(email)?)
    }

    /// Case-sensitive substring search over names.
    pub fn find_users_by_name(&self, name: &str) -> ServiceResult<Vec<User>> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(self.repo.find_by_name_contains(name)?)
    }
}

fn validate_id(id: Option<UserId>) -> Result<UserId, ValidationError> {
    match id {
        None => Err(ValidationError::MissingId),
        Some(id) if id <= 0 => Err(ValidationError::NonPositiveId(id)),
        Some(id) => Ok(id),
    }
}

fn validate_user_data(name: &str, email: &str, age: Option<i32>) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    if let Some(age) = age {
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(ValidationError::AgeOutOfRange(age));
        }
    }
    Ok(())
}
