//! Property groups and property types owned by a schema entity.

use crate::model::entity::Variation;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Presentation of a property group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupType {
    #[default]
    Group,
    Tab,
}

impl GroupType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Tab => "Tab",
        }
    }
}

impl Display for GroupType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Group" | "" => Ok(Self::Group),
            "Tab" => Ok(Self::Tab),
            other => Err(format!("unknown group type `{other}`")),
        }
    }
}

/// Named, ordered bucket of properties ("tab").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGroup {
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    pub group_type: GroupType,
    pub sort_order: i32,
}

impl PropertyGroup {
    pub fn new(key: Uuid, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key,
            alias: alias.into(),
            name: name.into(),
            group_type: GroupType::Group,
            sort_order: 0,
        }
    }
}

/// One property of a schema entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    pub description: String,
    /// Key of the data type definition backing this property.
    pub data_type_key: Uuid,
    /// Editor alias of the backing data type, kept for readability.
    pub editor_alias: String,
    pub mandatory: bool,
    pub validation: String,
    pub sort_order: i32,
    /// Alias of the owning group. `None` means ungrouped.
    pub group: Option<String>,
    /// Content and media types only.
    pub variations: Variation,
    /// Member types only.
    pub member_can_edit: bool,
    /// Member types only.
    pub member_can_view: bool,
    /// Member types only.
    pub is_sensitive: bool,
}

impl PropertyType {
    pub fn new(key: Uuid, alias: impl Into<String>, data_type_key: Uuid) -> Self {
        let alias = alias.into();
        Self {
            key,
            name: alias.clone(),
            alias,
            description: String::new(),
            data_type_key,
            editor_alias: String::new(),
            mandatory: false,
            validation: String::new(),
            sort_order: 0,
            group: None,
            variations: Variation::Nothing,
            member_can_edit: false,
            member_can_view: false,
            is_sensitive: false,
        }
    }
}
