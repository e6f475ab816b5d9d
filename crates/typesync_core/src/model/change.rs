//! Change records reported by deserialization.
//!
//! # Responsibility
//! - Describe one field-level difference between a document and an entity.
//!
//! # Invariants
//! - Constructing a record never mutates the entity it describes.
//! - `success == false` marks a change that was reported but not applied.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Kind of reported change, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    NoChange,
    Create,
    Update,
    Delete,
    Fail,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "NoChange",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Fail => "Fail",
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Field locator, e.g. `Property/Variations`.
    pub path: String,
    /// Human label, usually the alias of the affected item.
    pub name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub kind: ChangeKind,
    pub success: bool,
}

impl Change {
    fn build(
        kind: ChangeKind,
        path: impl Into<String>,
        name: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            old_value,
            new_value,
            kind,
            success: true,
        }
    }

    pub fn create(path: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::build(ChangeKind::Create, path, name, None, Some(value.into()))
    }

    pub fn update(
        path: impl Into<String>,
        name: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self::build(
            ChangeKind::Update,
            path,
            name,
            Some(old_value.into()),
            Some(new_value.into()),
        )
    }

    pub fn delete(path: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::build(ChangeKind::Delete, path, name, Some(value.into()), None)
    }

    pub fn no_change(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::build(ChangeKind::NoChange, path, name, None, None)
    }

    /// Failed change; always invalid.
    pub fn fail(path: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(ChangeKind::Fail, path, name, None, Some(message.into())).invalid()
    }

    /// Marks this change as reported but not applied.
    pub fn invalid(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.success
    }
}

/// Highest-severity kind among valid changes; `NoChange` when empty.
pub fn summarize(changes: &[Change]) -> ChangeKind {
    changes
        .iter()
        .filter(|change| change.success)
        .map(|change| change.kind)
        .max()
        .unwrap_or(ChangeKind::NoChange)
}
