//! View templates referenced by content types.

use crate::model::entity::EntityRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub key: Uuid,
    pub alias: String,
    pub name: String,
}

impl Template {
    pub fn new(key: Uuid, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key,
            alias: alias.into(),
            name: name.into(),
        }
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.key, self.alias.clone())
    }
}
