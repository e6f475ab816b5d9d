//! Canonical document tree.
//!
//! # Responsibility
//! - Represent an entity as a tree of named nodes with ordered attributes.
//! - Provide lookup helpers that default missing optional sections.
//!
//! # Invariants
//! - Attribute and child order is insertion order; writers sort before
//!   inserting so equal entities produce byte-identical text.
//! - A node with children ignores its scalar value when written.

mod view;
mod xml;

pub use view::{DocumentRef, FolderRef, InfoSection, PropertySection, TabSection, TypeDocument};

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Errors from document parsing and shape extraction.
#[derive(Debug)]
pub enum DocumentError {
    /// XML reader/writer failure.
    Xml(String),
    /// Input holds no root element.
    MissingRoot,
    /// Closing tag without matching opening tag, or unclosed element.
    Unbalanced,
    /// Root tag does not name a known entity kind.
    UnknownKind(String),
    /// Root element lacks a usable `Key` attribute.
    MissingKey,
    InvalidKey(String),
    /// Root element lacks an `Alias` attribute.
    MissingAlias,
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(message) => write!(f, "malformed document: {message}"),
            Self::MissingRoot => write!(f, "document has no root element"),
            Self::Unbalanced => write!(f, "document elements are not balanced"),
            Self::UnknownKind(tag) => write!(f, "unknown entity kind root tag `{tag}`"),
            Self::MissingKey => write!(f, "document root has no Key attribute"),
            Self::InvalidKey(value) => write!(f, "document key is not a valid uuid: {value}"),
            Self::MissingAlias => write!(f, "document root has no Alias attribute"),
        }
    }
}

impl Error for DocumentError {}

/// One named node of a canonical document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    value: String,
    children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Leaf node holding a scalar value.
    pub fn leaf(name: impl Into<String>, value: impl ToString) -> Self {
        Self::new(name).with_value(value)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets or replaces one attribute, keeping its original position.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    pub(crate) fn push_value(&mut self, text: &str) {
        self.value.push_str(text);
    }

    pub(crate) fn clear_value(&mut self) {
        self.value.clear();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Parses an attribute as uuid; blank, nil or malformed values yield `None`.
    pub fn attr_key(&self, key: &str) -> Option<Uuid> {
        self.attr(key)
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .filter(|key| !key.is_nil())
    }

    /// First child with the given name.
    pub fn element(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All children with the given name, in document order.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Trimmed scalar value of one child, if present.
    pub fn element_value(&self, name: &str) -> Option<&str> {
        self.element(name).map(|child| child.value.trim())
    }

    /// Untrimmed scalar value of one child, if present.
    pub fn element_text(&self, name: &str) -> Option<&str> {
        self.element(name).map(|child| child.value.as_str())
    }

    /// Child value as string, verbatim, or empty when missing.
    pub fn string_or_empty(&self, name: &str) -> String {
        self.element_text(name).unwrap_or_default().to_string()
    }

    /// Child value parsed as `T`, falling back to `default` when missing or malformed.
    pub fn value_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.element_value(name)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    /// Child value as bool (case-insensitive), falling back to `default`.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.element_value(name) {
            Some(value) if value.eq_ignore_ascii_case("true") => true,
            Some(value) if value.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    /// Writes this node as an indented XML document.
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        xml::write_document(self)
    }

    /// Parses an XML document into a node tree.
    pub fn from_xml(text: &str) -> Result<Self, DocumentError> {
        xml::read_document(text)
    }
}
