//! Live store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the lookup/persist capabilities the serializers consume.
//! - Isolate SQL details from serialization and import orchestration.
//!
//! # Invariants
//! - Store writes validate entity identity before persistence.
//! - Lookups return `Ok(None)` for missing rows; errors mean the store failed.

pub mod lock;
pub mod template_repo;
pub mod type_repo;
