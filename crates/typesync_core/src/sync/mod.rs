//! Import/export orchestration over the serializers.
//!
//! # Responsibility
//! - Run the dependency-deferred two-pass protocol over document batches.
//! - Keep the container tree aligned with document folder paths.
//! - Move documents between the sync folder and the live store.
//!
//! # Invariants
//! - Per-document failures are reported in outcomes; only infrastructure
//!   failures (folder listing, store listing) surface as `SyncError`.

pub mod batch;
pub mod containers;
pub mod handler;

use crate::io::file_service::FileError;
use crate::repo::type_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use batch::{BatchImporter, BatchItem, BatchReport, CancelFlag, ImportOutcome, PendingOverlay};
pub use containers::ContainerSync;
pub use handler::{ExportOutcome, SyncHandler};

pub type SyncResult<T> = Result<T, SyncError>;

/// Infrastructure failures that abort a whole sync run.
#[derive(Debug)]
pub enum SyncError {
    File(FileError),
    Store(StoreError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::File(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<FileError> for SyncError {
    fn from(value: FileError) -> Self {
        Self::File(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
