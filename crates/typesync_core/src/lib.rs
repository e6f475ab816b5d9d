//! Schema entity serialization and two-pass synchronization.
//! This crate owns the canonical document format and the import protocol.

pub mod config;
pub mod db;
pub mod document;
pub mod io;
pub mod logging;
pub mod model;
pub mod repo;
pub mod serializer;
pub mod sync;

pub use config::{ConfigError, SyncSettings};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use document::{DocumentError, Node, TypeDocument};
pub use io::file_service::{FileError, SyncFileService};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::change::{Change, ChangeKind};
pub use model::entity::{ContentType, EntityKey, EntityKind, EntityRef, Variation};
pub use repo::lock::SaveLocks;
pub use repo::template_repo::{SqliteTemplateStore, TemplateStore};
pub use repo::type_repo::{SqliteTypeStore, StoreError, StoreResult, TypeStore};
pub use serializer::{
    EntitySerializer, SerializerError, SerializerOptions, SerializerRegistry, SyncAttempt,
    SyncContext,
};
pub use sync::{BatchImporter, BatchItem, BatchReport, CancelFlag, SyncError, SyncHandler};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
