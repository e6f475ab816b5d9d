//! Schema entity domain model.
//!
//! # Responsibility
//! - Define the live records synchronized with canonical documents.
//! - Define the change records produced while applying documents.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityKey`.
//! - Cross-entity references carry key and alias together.

pub mod change;
pub mod container;
pub mod entity;
pub mod property;
pub mod template;
