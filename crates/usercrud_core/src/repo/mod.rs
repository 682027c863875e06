//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract consumed by the service layer.
//! - Isolate SQLite query and transaction details from validation logic.
//!
//! # Invariants
//! - Repository APIs distinguish absence (`Ok(None)`) from failure (`Err`).
//! - Storage failures always carry the original database error as `source`.

pub mod user_repo;
