//! Structured read view over an entity document.
//!
//! # Responsibility
//! - Extract named sections by fixed keys.
//! - Default every missing optional section instead of failing.
//!
//! # Invariants
//! - Only the root identity (kind, `Key`, `Alias`) is mandatory.

use super::{DocumentError, Node};
use crate::model::entity::{EntityKind, Variation};
use crate::model::property::GroupType;
use uuid::Uuid;

/// Reference to another item by optional key plus alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub key: Option<Uuid>,
    pub alias: String,
}

impl DocumentRef {
    fn from_node(node: &Node) -> Option<Self> {
        let alias = node.value().trim();
        let key = node.attr_key("Key");
        if alias.is_empty() && key.is_none() {
            return None;
        }
        Some(Self {
            key,
            alias: alias.to_string(),
        })
    }
}

/// Folder placement: slash-separated container path plus leaf key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub key: Option<Uuid>,
    pub path: String,
}

impl FolderRef {
    /// Non-empty path segments from root to leaf.
    pub fn segments(&self) -> Vec<&str> {
        self.path
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// `Info` section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoSection {
    pub name: String,
    pub icon: String,
    pub description: String,
    pub allow_at_root: bool,
    pub is_list_view: bool,
    pub variations: Variation,
    pub is_element: bool,
    pub parent: Option<DocumentRef>,
    pub folder: Option<FolderRef>,
    pub compositions: Vec<DocumentRef>,
    pub default_template: Option<DocumentRef>,
    /// `None` when the document carries no `AllowedTemplates` section.
    pub allowed_templates: Option<Vec<DocumentRef>>,
}

/// One entry of the `Tabs` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSection {
    pub key: Option<Uuid>,
    pub alias: String,
    pub name: String,
    pub group_type: GroupType,
    pub sort_order: i32,
}

/// One entry of the `GenericProperties` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySection {
    pub key: Option<Uuid>,
    pub alias: String,
    pub name: String,
    pub description: String,
    pub data_type_key: Option<Uuid>,
    pub editor_alias: String,
    pub mandatory: bool,
    pub validation: String,
    pub sort_order: i32,
    /// Alias of the owning tab.
    pub tab: Option<String>,
    pub variations: Variation,
    pub member_can_edit: bool,
    pub member_can_view: bool,
    pub is_sensitive: bool,
}

/// Structured view of one entity document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDocument {
    pub kind: EntityKind,
    pub key: Uuid,
    pub alias: String,
    pub info: InfoSection,
    pub structure: Vec<DocumentRef>,
    pub properties: Vec<PropertySection>,
    pub tabs: Vec<TabSection>,
}

impl TypeDocument {
    /// Extracts the structured view from a document root.
    ///
    /// # Errors
    /// - Unknown root tag, missing/invalid `Key`, or missing `Alias`.
    pub fn from_node(root: &Node) -> Result<Self, DocumentError> {
        let kind = EntityKind::from_root_tag(root.name())
            .ok_or_else(|| DocumentError::UnknownKind(root.name().to_string()))?;

        let raw_key = root.attr("Key").ok_or(DocumentError::MissingKey)?;
        let key = Uuid::parse_str(raw_key.trim())
            .map_err(|_| DocumentError::InvalidKey(raw_key.to_string()))?;
        if key.is_nil() {
            return Err(DocumentError::InvalidKey(raw_key.to_string()));
        }

        let alias = root
            .attr("Alias")
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .ok_or(DocumentError::MissingAlias)?
            .to_string();

        let info = root
            .element("Info")
            .map(|info| read_info(info, &alias))
            .unwrap_or_else(|| InfoSection {
                name: alias.clone(),
                ..InfoSection::default()
            });

        Ok(Self {
            kind,
            key,
            alias,
            info,
            structure: read_refs(root.element("Structure"), None),
            properties: root
                .element("GenericProperties")
                .map(|section| {
                    section
                        .elements("GenericProperty")
                        .filter_map(read_property)
                        .collect()
                })
                .unwrap_or_default(),
            tabs: root
                .element("Tabs")
                .map(|section| section.elements("Tab").filter_map(read_tab).collect())
                .unwrap_or_default(),
        })
    }
}

fn read_info(info: &Node, alias: &str) -> InfoSection {
    let name = info.element_text("Name").unwrap_or(alias).to_string();

    InfoSection {
        name,
        icon: info.string_or_empty("Icon"),
        description: info.string_or_empty("Description"),
        allow_at_root: info.bool_or("AllowAtRoot", false),
        is_list_view: info.bool_or("IsListView", false),
        variations: info.value_or("Variations", Variation::Nothing),
        is_element: info.bool_or("IsElement", false),
        parent: info.element("Parent").and_then(DocumentRef::from_node),
        folder: info.element("Folder").and_then(|folder| {
            let path = folder.value().trim();
            (!path.is_empty()).then(|| FolderRef {
                key: folder.attr_key("Key"),
                path: path.to_string(),
            })
        }),
        compositions: read_refs(info.element("Compositions"), Some("Composition")),
        default_template: info
            .element("DefaultTemplate")
            .and_then(DocumentRef::from_node),
        allowed_templates: info
            .element("AllowedTemplates")
            .map(|section| read_refs(Some(section), Some("Template"))),
    }
}

fn read_refs(section: Option<&Node>, child_name: Option<&str>) -> Vec<DocumentRef> {
    let Some(section) = section else {
        return Vec::new();
    };
    section
        .children()
        .iter()
        .filter(|child| child_name.map_or(true, |name| child.name() == name))
        .filter_map(DocumentRef::from_node)
        .collect()
}

fn read_tab(node: &Node) -> Option<TabSection> {
    let alias = node.element_value("Alias").filter(|alias| !alias.is_empty())?;
    Some(TabSection {
        key: node.element_value("Key").and_then(parse_key),
        alias: alias.to_string(),
        name: node.element_text("Caption").unwrap_or(alias).to_string(),
        group_type: node.value_or("Type", GroupType::Group),
        sort_order: node.value_or("SortOrder", 0),
    })
}

fn read_property(node: &Node) -> Option<PropertySection> {
    let alias = node.element_value("Alias").filter(|alias| !alias.is_empty())?;
    Some(PropertySection {
        key: node.element_value("Key").and_then(parse_key),
        alias: alias.to_string(),
        name: node.element_text("Name").unwrap_or(alias).to_string(),
        description: node.string_or_empty("Description"),
        data_type_key: node.element_value("Definition").and_then(parse_key),
        editor_alias: node.string_or_empty("Type"),
        mandatory: node.bool_or("Mandatory", false),
        validation: node.string_or_empty("Validation"),
        sort_order: node.value_or("SortOrder", 0),
        tab: node
            .element("Tab")
            .and_then(|tab| tab.attr("Alias").or(Some(tab.value())))
            .map(str::trim)
            .filter(|tab| !tab.is_empty())
            .map(str::to_string),
        variations: node.value_or("Variations", Variation::Nothing),
        member_can_edit: node.bool_or("CanEdit", false),
        member_can_view: node.bool_or("CanView", false),
        is_sensitive: node.bool_or("IsSensitive", false),
    })
}

fn parse_key(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value).ok().filter(|key| !key.is_nil())
}

#[cfg(test)]
mod tests {
    use super::TypeDocument;
    use crate::document::{DocumentError, Node};
    use crate::model::entity::EntityKind;

    #[test]
    fn minimal_document_defaults_every_section() {
        let root = Node::new("MemberType")
            .with_attr("Key", "0b6fbbdc-8f6a-4d1c-9c1e-3b1b4a0a2f10")
            .with_attr("Alias", "member");

        let doc = TypeDocument::from_node(&root).unwrap();
        assert_eq!(doc.kind, EntityKind::MemberType);
        assert_eq!(doc.info.name, "member");
        assert!(doc.info.compositions.is_empty());
        assert!(doc.info.allowed_templates.is_none());
        assert!(doc.structure.is_empty());
        assert!(doc.tabs.is_empty());
        assert!(doc.properties.is_empty());
    }

    #[test]
    fn identity_is_mandatory() {
        let unknown = Node::new("DataType").with_attr("Alias", "x");
        assert!(matches!(
            TypeDocument::from_node(&unknown),
            Err(DocumentError::UnknownKind(_))
        ));

        let no_key = Node::new("ContentType").with_attr("Alias", "x");
        assert!(matches!(
            TypeDocument::from_node(&no_key),
            Err(DocumentError::MissingKey)
        ));

        let bad_key = Node::new("ContentType")
            .with_attr("Key", "nope")
            .with_attr("Alias", "x");
        assert!(matches!(
            TypeDocument::from_node(&bad_key),
            Err(DocumentError::InvalidKey(_))
        ));

        let no_alias =
            Node::new("ContentType").with_attr("Key", "0b6fbbdc-8f6a-4d1c-9c1e-3b1b4a0a2f10");
        assert!(matches!(
            TypeDocument::from_node(&no_alias),
            Err(DocumentError::MissingAlias)
        ));
    }

    #[test]
    fn property_tab_prefers_alias_attribute() {
        let root = Node::new("ContentType")
            .with_attr("Key", "0b6fbbdc-8f6a-4d1c-9c1e-3b1b4a0a2f10")
            .with_attr("Alias", "page")
            .with_child(
                Node::new("GenericProperties").with_child(
                    Node::new("GenericProperty")
                        .with_child(Node::leaf("Alias", "title"))
                        .with_child(Node::leaf("Tab", "Content").with_attr("Alias", "content")),
                ),
            );

        let doc = TypeDocument::from_node(&root).unwrap();
        assert_eq!(doc.properties[0].tab.as_deref(), Some("content"));
        assert_eq!(doc.properties[0].name, "title");
    }
}
