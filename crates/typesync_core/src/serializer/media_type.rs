//! Media type fields: list view and variations.

use super::base::{KindFields, TypeSerializer};
use super::tracker::Tracker;
use crate::document::{Node, PropertySection, TypeDocument};
use crate::model::entity::{ContentType, EntityKind};
use crate::model::property::PropertyType;

pub type MediaTypeSerializer = TypeSerializer<MediaTypeFields>;

#[derive(Debug, Default, Clone, Copy)]
pub struct MediaTypeFields;

impl KindFields for MediaTypeFields {
    fn kind(&self) -> EntityKind {
        EntityKind::MediaType
    }

    fn info_flags(&self, item: &ContentType) -> Vec<Node> {
        vec![
            Node::leaf("IsListView", item.is_container),
            Node::leaf("Variations", item.variations),
        ]
    }

    fn property_flags(&self, property: &PropertyType) -> Vec<Node> {
        vec![Node::leaf("Variations", property.variations)]
    }

    fn apply_info_flags(&self, item: &mut ContentType, doc: &TypeDocument, tracker: &mut Tracker) {
        tracker.set(
            &mut item.is_container,
            doc.info.is_list_view,
            "Info/IsListView",
            "IsListView",
        );
        tracker.set(
            &mut item.variations,
            doc.info.variations,
            "Info/Variations",
            "Variations",
        );
    }

    fn apply_property_flags(
        &self,
        property: &mut PropertyType,
        section: &PropertySection,
        tracker: &mut Tracker,
    ) {
        tracker.set(
            &mut property.variations,
            section.variations,
            "Property/Variations",
            &section.alias,
        );
    }
}
