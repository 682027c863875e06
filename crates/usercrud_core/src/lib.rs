//! Core domain logic for the user record manager.
//! This crate is the single source of truth for user invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, DatabaseConfig, LoggingConfig};
pub use db::{Database, DbError, DbResult, Session};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::user::{User, UserId};
pub use repo::user_repo::{RepoError, RepoResult, SqliteUserRepository, UserRepository};
pub use service::user_service::{
    ServiceError, ServiceResult, UserService, ValidationError, MAX_AGE, MIN_AGE,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
