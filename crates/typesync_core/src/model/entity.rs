//! Schema entity domain model.
//!
//! # Responsibility
//! - Define the live, mutable record for content/media/member types.
//! - Track unsaved modifications so persistence can be skipped when clean.
//!
//! # Invariants
//! - `key` is stable and never reassigned once the entity exists.
//! - `alias` is the on-disk naming key and must not be blank.
//! - An entity never lists itself as a composition.
//! - Property and group aliases are unique within the owning entity once
//!   an import has fully reconciled it (see `validate_schema`).

use crate::model::property::{PropertyGroup, PropertyType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Durable identity of a schema entity, stable across renames.
pub type EntityKey = Uuid;

/// Closed set of schema entity kinds sharing one serialization shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Document types with templates and list-view support.
    ContentType,
    /// Media types.
    MediaType,
    /// Member types with per-property member visibility flags.
    MemberType,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::ContentType, Self::MediaType, Self::MemberType];

    /// Storage identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentType => "content_type",
            Self::MediaType => "media_type",
            Self::MemberType => "member_type",
        }
    }

    /// Root element name used in canonical documents.
    pub fn root_tag(self) -> &'static str {
        match self {
            Self::ContentType => "ContentType",
            Self::MediaType => "MediaType",
            Self::MemberType => "MemberType",
        }
    }

    /// Folder name used when exporting this kind.
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::ContentType => "ContentTypes",
            Self::MediaType => "MediaTypes",
            Self::MemberType => "MemberTypes",
        }
    }

    pub fn from_root_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.root_tag() == tag)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Culture/segment variation setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Variation {
    #[default]
    Nothing,
    Culture,
    Segment,
    CultureAndSegment,
}

impl Variation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Culture => "Culture",
            Self::Segment => "Segment",
            Self::CultureAndSegment => "CultureAndSegment",
        }
    }
}

impl Display for Variation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Nothing" | "" => Ok(Self::Nothing),
            "Culture" => Ok(Self::Culture),
            "Segment" => Ok(Self::Segment),
            "CultureAndSegment" => Ok(Self::CultureAndSegment),
            other => Err(format!("unknown variation `{other}`")),
        }
    }
}

/// Cross-entity reference carrying both durable key and human alias.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub key: Uuid,
    pub alias: String,
}

impl EntityRef {
    pub fn new(key: Uuid, alias: impl Into<String>) -> Self {
        Self {
            key,
            alias: alias.into(),
        }
    }
}

/// Validation failures for schema entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    NilKey,
    BlankAlias,
    DuplicatePropertyAlias(String),
    DuplicateGroupAlias(String),
    SelfComposition(String),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilKey => write!(f, "entity key must not be nil"),
            Self::BlankAlias => write!(f, "entity alias must not be blank"),
            Self::DuplicatePropertyAlias(alias) => {
                write!(f, "property alias is declared more than once: {alias}")
            }
            Self::DuplicateGroupAlias(alias) => {
                write!(f, "property group alias is declared more than once: {alias}")
            }
            Self::SelfComposition(alias) => write!(f, "entity cannot compose itself: {alias}"),
        }
    }
}

impl Error for EntityValidationError {}

/// Live schema entity: content, media or member type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentType {
    /// Store-assigned numeric id. `None` until first save.
    #[serde(skip)]
    pub id: Option<i64>,
    pub key: EntityKey,
    pub kind: EntityKind,
    pub alias: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub allow_at_root: bool,
    /// Rendered as a list view (content and media only).
    pub is_container: bool,
    /// Element types are not directly creatable as content.
    pub is_element: bool,
    pub variations: Variation,
    /// Tree placement under another entity of the same kind.
    pub parent: Option<EntityRef>,
    /// Folder placement. Ignored while `parent` is set.
    pub container: Option<Uuid>,
    pub compositions: Vec<EntityRef>,
    /// Structure: entities allowed as children.
    pub allowed_children: Vec<EntityRef>,
    pub default_template: Option<EntityRef>,
    pub allowed_templates: Vec<EntityRef>,
    pub groups: Vec<PropertyGroup>,
    pub properties: Vec<PropertyType>,
    #[serde(skip)]
    dirty: BTreeSet<String>,
}

impl ContentType {
    /// Creates a new, unsaved entity.
    pub fn new(
        kind: EntityKind,
        key: EntityKey,
        alias: impl Into<String>,
    ) -> Result<Self, EntityValidationError> {
        let alias = alias.into();
        if key.is_nil() {
            return Err(EntityValidationError::NilKey);
        }
        if alias.trim().is_empty() {
            return Err(EntityValidationError::BlankAlias);
        }

        Ok(Self {
            id: None,
            key,
            kind,
            name: alias.clone(),
            alias,
            icon: String::new(),
            description: String::new(),
            allow_at_root: false,
            is_container: false,
            is_element: false,
            variations: Variation::Nothing,
            parent: None,
            container: None,
            compositions: Vec::new(),
            allowed_children: Vec::new(),
            default_template: None,
            allowed_templates: Vec::new(),
            groups: Vec::new(),
            properties: Vec::new(),
            dirty: BTreeSet::new(),
        })
    }

    /// Returns whether the entity has never been persisted.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Returns whether the entity carries modifications not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.is_new() || !self.dirty.is_empty()
    }

    /// Records one modified field.
    pub fn mark_dirty(&mut self, field: impl Into<String>) {
        self.dirty.insert(field.into());
    }

    /// Sorted names of modified fields.
    pub fn dirty_properties(&self) -> Vec<&str> {
        self.dirty.iter().map(String::as_str).collect()
    }

    /// Called by stores after a successful save.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.key, self.alias.clone())
    }

    pub fn property(&self, alias: &str) -> Option<&PropertyType> {
        self.properties.iter().find(|property| property.alias == alias)
    }

    pub fn group(&self, alias: &str) -> Option<&PropertyGroup> {
        self.groups.iter().find(|group| group.alias == alias)
    }

    /// Owned properties assigned to one group, in sort order.
    pub fn properties_in(&self, group_alias: &str) -> Vec<&PropertyType> {
        let mut properties = self
            .properties
            .iter()
            .filter(|property| property.group.as_deref() == Some(group_alias))
            .collect::<Vec<_>>();
        properties.sort_by(|a, b| (a.sort_order, &a.alias).cmp(&(b.sort_order, &b.alias)));
        properties
    }

    pub fn composes(&self, key: EntityKey) -> bool {
        self.compositions.iter().any(|composition| composition.key == key)
    }

    /// Validates identity invariants required before any persistence.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.key.is_nil() {
            return Err(EntityValidationError::NilKey);
        }
        if self.alias.trim().is_empty() {
            return Err(EntityValidationError::BlankAlias);
        }
        if self.composes(self.key) {
            return Err(EntityValidationError::SelfComposition(self.alias.clone()));
        }
        Ok(())
    }

    /// Validates alias uniqueness of owned groups and properties.
    ///
    /// Duplicates may exist transiently between first and second import pass
    /// (a rename onto an alias whose holder is deleted later), so this check
    /// runs only once the structure is reconciled.
    pub fn validate_schema(&self) -> Result<(), EntityValidationError> {
        self.validate()?;

        let mut seen = BTreeSet::new();
        for property in &self.properties {
            if !seen.insert(property.alias.to_ascii_lowercase()) {
                return Err(EntityValidationError::DuplicatePropertyAlias(
                    property.alias.clone(),
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for group in &self.groups {
            if !seen.insert(group.alias.as_str()) {
                return Err(EntityValidationError::DuplicateGroupAlias(group.alias.clone()));
            }
        }
        Ok(())
    }
}
