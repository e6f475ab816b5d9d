#![allow(dead_code)]

use rusqlite::Connection;
use typesync_core::document::Node;
use typesync_core::model::property::{PropertyGroup, PropertyType};
use typesync_core::{
    open_db_in_memory, ContentType, EntityKind, SaveLocks, SqliteTemplateStore, SqliteTypeStore,
};
use uuid::Uuid;

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

/// Stores and locks over one connection.
pub struct Live<'c> {
    pub types: SqliteTypeStore<'c>,
    pub templates: SqliteTemplateStore<'c>,
    pub locks: SaveLocks,
}

impl<'c> Live<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            types: SqliteTypeStore::try_new(conn).unwrap(),
            templates: SqliteTemplateStore::try_new(conn).unwrap(),
            locks: SaveLocks::new(),
        }
    }

    pub fn ctx(&self) -> typesync_core::SyncContext<'_> {
        typesync_core::SyncContext::new(&self.types, &self.templates, &self.locks)
    }
}

pub fn content_type(alias: &str) -> ContentType {
    ContentType::new(EntityKind::ContentType, Uuid::new_v4(), alias).unwrap()
}

/// Adds one property in `group`, creating the group when missing.
pub fn add_property(item: &mut ContentType, group: &str, alias: &str, sort_order: i32) -> Uuid {
    if item.group(group).is_none() {
        let sort = item.groups.len() as i32;
        let mut new_group = PropertyGroup::new(Uuid::new_v4(), group, group);
        new_group.sort_order = sort;
        item.groups.push(new_group);
    }
    let mut property = PropertyType::new(Uuid::new_v4(), alias, Uuid::new_v4());
    property.editor_alias = "Umbraco.TextBox".to_string();
    property.sort_order = sort_order;
    property.group = Some(group.to_string());
    let key = property.key;
    item.properties.push(property);
    key
}

/// Copy of `node` without the property whose `Alias` equals `alias`.
pub fn without_property(node: &Node, alias: &str) -> Node {
    rebuild(node, &|section: &Node| {
        if section.name() != "GenericProperties" {
            return section.clone();
        }
        let mut filtered = Node::new("GenericProperties");
        for property in section.children() {
            if property.element_value("Alias") != Some(alias) {
                filtered.push(property.clone());
            }
        }
        filtered
    })
}

/// Copy of `node` with every top-level section passed through `map`.
pub fn rebuild(node: &Node, map: &dyn Fn(&Node) -> Node) -> Node {
    let mut copy = Node::new(node.name());
    for (key, value) in node.attributes() {
        copy.set_attr(key.clone(), value);
    }
    for child in node.children() {
        copy.push(map(child));
    }
    copy
}

/// Copy of `node` with one `Info` child replaced or appended.
pub fn with_info(node: &Node, field: Node) -> Node {
    rebuild(node, &|section: &Node| {
        if section.name() != "Info" {
            return section.clone();
        }
        let mut info = Node::new("Info");
        let mut replaced = false;
        for child in section.children() {
            if child.name() == field.name() {
                info.push(field.clone());
                replaced = true;
            } else {
                info.push(child.clone());
            }
        }
        if !replaced {
            info.push(field.clone());
        }
        info
    })
}

pub const TEXT_DATA_TYPE: &str = "0cc0eba1-9960-42c9-bf9b-60e150b429ae";

/// Minimal document: identity plus `Info/Name`.
pub fn doc(kind: EntityKind, key: Uuid, alias: &str) -> Node {
    Node::new(kind.root_tag())
        .with_attr("Key", key)
        .with_attr("Alias", alias)
        .with_child(Node::new("Info").with_child(Node::leaf("Name", alias)))
}

/// Copy of `node` composing the given `(key, alias)` references.
pub fn composing(node: &Node, references: &[(Uuid, &str)]) -> Node {
    with_info(
        node,
        Node::new("Compositions").with_children(
            references
                .iter()
                .map(|(key, alias)| Node::leaf("Composition", alias).with_attr("Key", key)),
        ),
    )
}

pub fn property_node(key: Uuid, alias: &str, tab: &str, sort_order: i32) -> Node {
    Node::new("GenericProperty")
        .with_child(Node::leaf("Key", key))
        .with_child(Node::leaf("Name", alias))
        .with_child(Node::leaf("Alias", alias))
        .with_child(Node::leaf("Definition", TEXT_DATA_TYPE))
        .with_child(Node::leaf("Type", "Umbraco.TextBox"))
        .with_child(Node::leaf("SortOrder", sort_order))
        .with_child(Node::leaf("Tab", tab).with_attr("Alias", tab))
}

pub fn tab_node(key: Uuid, alias: &str, sort_order: i32) -> Node {
    Node::new("Tab")
        .with_child(Node::leaf("Key", key))
        .with_child(Node::leaf("Caption", alias))
        .with_child(Node::leaf("Alias", alias))
        .with_child(Node::leaf("Type", "Group"))
        .with_child(Node::leaf("SortOrder", sort_order))
}
