//! Folder containers that organize entities of one kind.

use crate::model::entity::EntityKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Folder node in the per-kind container tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityContainer {
    /// Store-assigned numeric id. `None` until first save.
    pub id: Option<i64>,
    pub key: Uuid,
    pub kind: EntityKind,
    pub name: String,
    /// Parent container key. `None` means root-level.
    pub parent: Option<Uuid>,
}

impl EntityContainer {
    pub fn new(kind: EntityKind, key: Uuid, name: impl Into<String>, parent: Option<Uuid>) -> Self {
        Self {
            id: None,
            key,
            kind,
            name: name.into(),
            parent,
        }
    }
}
