//! Domain model for persisted user records.
//!
//! # Invariants
//! - The model is a single flat record type; no entity references another.
//! - Identity is assigned by storage, never by callers.

pub mod user;
