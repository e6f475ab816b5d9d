//! Entity serializers: entity to canonical document and back.
//!
//! # Responsibility
//! - Define the serializer contract shared by every entity kind.
//! - Split document application into a first pass (scalar fields, tabs,
//!   properties) and a second pass (cross-entity edges, cleanup, persist).
//!
//! # Invariants
//! - Serializers hold no state between calls.
//! - Every field mutation during deserialization emits one `Change`.
//! - Per-entity failures are returned inside `SyncAttempt`, never as `Err`.

pub mod base;
pub mod content_type;
pub mod media_type;
pub mod member_type;
pub mod registry;
pub mod tracker;

use crate::document::{DocumentError, Node};
use crate::model::change::{summarize, Change, ChangeKind};
use crate::model::entity::{ContentType, EntityKind};
use crate::repo::lock::SaveLocks;
use crate::repo::template_repo::TemplateStore;
use crate::repo::type_repo::{StoreError, TypeStore};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use base::{KindFields, TypeSerializer};
pub use content_type::{ContentTypeFields, ContentTypeSerializer};
pub use media_type::{MediaTypeFields, MediaTypeSerializer};
pub use member_type::{MemberTypeFields, MemberTypeSerializer};
pub use registry::{RegistryError, SerializerRegistry};
pub use tracker::Tracker;

/// Errors raised while building or resolving one document.
#[derive(Debug)]
pub enum SerializerError {
    Document(DocumentError),
    Store(StoreError),
    /// Entity or document fails its structural invariants.
    Validation(String),
    /// Document root names another kind than the serializer handles.
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },
}

impl Display for SerializerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Validation(message) => write!(f, "invalid entity: {message}"),
            Self::KindMismatch { expected, actual } => {
                write!(f, "serializer for {expected} cannot handle {actual} documents")
            }
        }
    }
}

impl Error for SerializerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentError> for SerializerError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

impl From<StoreError> for SerializerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Live-state capabilities available to a serializer call.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub types: &'a dyn TypeStore,
    pub templates: &'a dyn TemplateStore,
    pub locks: &'a SaveLocks,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        types: &'a dyn TypeStore,
        templates: &'a dyn TemplateStore,
        locks: &'a SaveLocks,
    ) -> Self {
        Self {
            types,
            templates,
            locks,
        }
    }
}

/// Flags controlling persistence during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializerOptions {
    /// Suppress every write; change data is still produced.
    pub do_not_save: bool,
    /// Save even when the entity carries no modifications.
    pub force: bool,
}

impl SerializerOptions {
    /// Dry-run options used for reports.
    pub fn report() -> Self {
        Self {
            do_not_save: true,
            force: false,
        }
    }
}

/// Outcome of applying one document pass.
#[derive(Debug, Clone)]
pub struct SyncAttempt {
    pub success: bool,
    /// Entity alias, or the best available label when parsing failed.
    pub name: String,
    pub item: Option<ContentType>,
    pub change: ChangeKind,
    pub details: Vec<Change>,
    /// Whether this pass wrote the entity to the live store.
    pub saved: bool,
    pub error: Option<String>,
}

impl SyncAttempt {
    /// Successful pass; the change kind is derived from `details`.
    pub fn succeed(name: impl Into<String>, item: ContentType, details: Vec<Change>) -> Self {
        Self {
            success: true,
            name: name.into(),
            change: summarize(&details),
            item: Some(item),
            details,
            saved: false,
            error: None,
        }
    }

    /// Failed pass for one document; the batch continues.
    pub fn fail(name: impl Into<String>, error: impl Display) -> Self {
        Self {
            success: false,
            name: name.into(),
            item: None,
            change: ChangeKind::Fail,
            details: Vec::new(),
            saved: false,
            error: Some(error.to_string()),
        }
    }
}

/// Fixed serialization contract implemented once per entity kind.
pub trait EntitySerializer: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Builds the canonical document for `item`.
    fn serialize(&self, item: &ContentType, ctx: &SyncContext<'_>) -> Result<Node, SerializerError>;

    /// First pass: resolve or create the entity and apply scalar fields,
    /// tabs and properties. Nothing is deleted and nothing is saved.
    fn deserialize(
        &self,
        node: &Node,
        ctx: &SyncContext<'_>,
        options: &SerializerOptions,
    ) -> SyncAttempt;

    /// Second pass: wire compositions and structure, apply deferred
    /// deletions and placement, then persist when dirty.
    fn deserialize_second_pass(
        &self,
        item: ContentType,
        node: &Node,
        ctx: &SyncContext<'_>,
        options: &SerializerOptions,
    ) -> SyncAttempt;
}
