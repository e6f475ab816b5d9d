//! XML codec for canonical documents.
//!
//! # Invariants
//! - Output is indented by two spaces, one element per line, with a
//!   trailing newline, so documents diff cleanly line by line.
//! - Leaf values are read back verbatim; whitespace between child
//!   elements is dropped.

use super::{DocumentError, Node};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const INDENT_SIZE: usize = 2;

pub(super) fn write_document(root: &Node) -> Result<String, DocumentError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|err| DocumentError::Xml(err.to_string()))?;
    write_node(&mut writer, root)?;

    let mut text =
        String::from_utf8(writer.into_inner()).map_err(|err| DocumentError::Xml(err.to_string()))?;
    text.push('\n');
    Ok(text)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(node.name());
    for (key, value) in node.attributes() {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children().is_empty() && node.value().is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    if node.children().is_empty() {
        emit(writer, Event::Text(BytesText::new(node.value())))?;
    } else {
        for child in node.children() {
            write_node(writer, child)?;
        }
    }
    emit(writer, Event::End(BytesEnd::new(node.name())))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|err| DocumentError::Xml(err.to_string()))
}

pub(super) fn read_document(text: &str) -> Result<Node, DocumentError> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| DocumentError::Xml(err.to_string()))?;
        match event {
            Event::Start(start) => stack.push(open_node(&start)?),
            Event::Empty(start) => {
                let node = open_node(&start)?;
                close_node(&mut stack, &mut root, node);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let value = text
                        .unescape()
                        .map_err(|err| DocumentError::Xml(err.to_string()))?;
                    current.push_value(&value);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.push_value(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or(DocumentError::Unbalanced)?;
                close_node(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocumentError::Unbalanced);
    }
    root.ok_or(DocumentError::MissingRoot)
}

fn open_node(start: &BytesStart<'_>) -> Result<Node, DocumentError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = Node::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| DocumentError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| DocumentError::Xml(err.to_string()))?;
        node.set_attr(key, value);
    }
    Ok(node)
}

fn close_node(stack: &mut [Node], root: &mut Option<Node>, mut node: Node) {
    if !node.children().is_empty() {
        // indentation between child elements
        node.clear_value();
    }
    match stack.last_mut() {
        Some(parent) => parent.push(node),
        // Only the first top-level element is the document root.
        None if root.is_none() => *root = Some(node),
        None => {}
    }
}
