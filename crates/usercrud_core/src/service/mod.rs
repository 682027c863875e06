//! Core use-case services.
//!
//! # Responsibility
//! - Enforce business-level input rules before any storage access.
//! - Keep the console front end decoupled from storage details.

pub mod user_service;
