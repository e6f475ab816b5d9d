//! Serializer registry keyed by entity kind.

use super::{
    ContentTypeSerializer, EntitySerializer, MediaTypeSerializer, MemberTypeSerializer,
};
use crate::document::Node;
use crate::model::entity::EntityKind;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Serializer registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateKind(EntityKind),
    UnknownRootTag(String),
    NotRegistered(EntityKind),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKind(kind) => write!(f, "serializer already registered: {kind}"),
            Self::UnknownRootTag(tag) => write!(f, "no entity kind for root tag: {tag}"),
            Self::NotRegistered(kind) => write!(f, "no serializer registered for: {kind}"),
        }
    }
}

impl Error for RegistryError {}

/// Kind to serializer map, built once at startup.
#[derive(Default)]
pub struct SerializerRegistry {
    serializers: BTreeMap<EntityKind, Arc<dyn EntitySerializer>>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the content, media and member type serializers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: [Arc<dyn EntitySerializer>; 3] = [
            Arc::new(ContentTypeSerializer::default()),
            Arc::new(MediaTypeSerializer::default()),
            Arc::new(MemberTypeSerializer::default()),
        ];
        for serializer in defaults {
            let kind = serializer.kind();
            registry.serializers.insert(kind, serializer);
        }
        registry
    }

    /// Registers one serializer; each kind may be registered once.
    pub fn register(&mut self, serializer: Arc<dyn EntitySerializer>) -> Result<(), RegistryError> {
        let kind = serializer.kind();
        if self.serializers.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.serializers.insert(kind, serializer);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Registered kinds in stable order.
    pub fn kinds(&self) -> Vec<EntityKind> {
        self.serializers.keys().copied().collect()
    }

    pub fn get(&self, kind: EntityKind) -> Option<Arc<dyn EntitySerializer>> {
        self.serializers.get(&kind).cloned()
    }

    /// Serializer for a document, selected by its root tag.
    pub fn for_node(&self, node: &Node) -> Result<Arc<dyn EntitySerializer>, RegistryError> {
        let kind = EntityKind::from_root_tag(node.name())
            .ok_or_else(|| RegistryError::UnknownRootTag(node.name().to_string()))?;
        self.get(kind).ok_or(RegistryError::NotRegistered(kind))
    }
}
