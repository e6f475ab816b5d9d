//! Member type fields: per-property member visibility flags.

use super::base::{KindFields, TypeSerializer};
use super::tracker::Tracker;
use crate::document::{Node, PropertySection};
use crate::model::entity::EntityKind;
use crate::model::property::PropertyType;

pub type MemberTypeSerializer = TypeSerializer<MemberTypeFields>;

#[derive(Debug, Default, Clone, Copy)]
pub struct MemberTypeFields;

impl KindFields for MemberTypeFields {
    fn kind(&self) -> EntityKind {
        EntityKind::MemberType
    }

    fn property_flags(&self, property: &PropertyType) -> Vec<Node> {
        vec![
            Node::leaf("CanEdit", property.member_can_edit),
            Node::leaf("CanView", property.member_can_view),
            Node::leaf("IsSensitive", property.is_sensitive),
        ]
    }

    fn apply_property_flags(
        &self,
        property: &mut PropertyType,
        section: &PropertySection,
        tracker: &mut Tracker,
    ) {
        let name = section.alias.as_str();
        tracker.set(
            &mut property.member_can_edit,
            section.member_can_edit,
            "Property/CanEdit",
            name,
        );
        tracker.set(
            &mut property.member_can_view,
            section.member_can_view,
            "Property/CanView",
            name,
        );
        tracker.set(
            &mut property.is_sensitive,
            section.is_sensitive,
            "Property/IsSensitive",
            name,
        );
    }
}
