//! Parse-tree access to scan and service-list documents.
//!
//! The catalog engine never walks raw XML text. This module reads a whole
//! document into a small tree of [`Node`]s (element name, attributes,
//! children) and the rest of the crate consumes only that tree: node
//! traversal plus attribute lookup with an explicit radix, since broadcast
//! ids are conventionally written in hex while frequencies and symbol rates
//! are decimal.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{CatalogError, Result};

/// One element of a parsed document.
#[derive(Debug, Clone, Default)]
pub struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Node {
    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements with the given name, in document order.
    pub fn children_named<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a Node> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child element with the given name.
    pub fn first_child(&self, name: &str) -> Option<&Node> {
        self.children_named(name).next()
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Signed decimal attribute.
    pub fn attr_dec(&self, name: &str) -> Option<i64> {
        self.attr(name)?.trim().parse().ok()
    }

    /// Unsigned hex attribute; an optional `0x` prefix is accepted.
    pub fn attr_hex(&self, name: &str) -> Option<u64> {
        let raw = self.attr(name)?.trim();
        let raw = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
        u64::from_str_radix(raw, 16).ok()
    }

    /// Decimal attribute narrowed to `u32`.
    pub fn attr_u32(&self, name: &str) -> Option<u32> {
        self.attr_dec(name).and_then(|v| u32::try_from(v).ok())
    }

    /// Decimal attribute narrowed to `u8`.
    pub fn attr_u8(&self, name: &str) -> Option<u8> {
        self.attr_dec(name).and_then(|v| u8::try_from(v).ok())
    }

    /// Decimal attribute narrowed to `i16`.
    pub fn attr_i16(&self, name: &str) -> Option<i16> {
        self.attr_dec(name).and_then(|v| i16::try_from(v).ok())
    }

    /// Hex attribute narrowed to `u16`.
    pub fn attr_u16_hex(&self, name: &str) -> Option<u16> {
        self.attr_hex(name).and_then(|v| u16::try_from(v).ok())
    }

    /// Hex attribute narrowed to `u8`.
    pub fn attr_u8_hex(&self, name: &str) -> Option<u8> {
        self.attr_hex(name).and_then(|v| u8::try_from(v).ok())
    }
}

/// A parsed document with a single root element.
#[derive(Debug, Clone)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Parse a document from XML text.
    pub fn parse(text: &str) -> Result<Document> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);
        let mut buf = Vec::new();

        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => stack.push(node_from(&e)?),
                Ok(Event::Empty(e)) => {
                    let node = node_from(&e)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack.pop().ok_or_else(|| {
                        CatalogError::MalformedDocument("unmatched end tag".into())
                    })?;
                    attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(CatalogError::MalformedDocument("unclosed element".into()));
        }
        root.map(|root| Document { root })
            .ok_or_else(|| CatalogError::MalformedDocument("document has no root element".into()))
    }

    /// Read and parse a document from a file.
    pub fn load(path: &Path) -> Result<Document> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                CatalogError::FileNotFound(path.to_path_buf())
            } else {
                CatalogError::Io(e)
            }
        })?;
        Self::parse(&text)
    }

    /// Root element.
    pub fn root(&self) -> &Node {
        &self.root
    }
}

fn node_from(e: &BytesStart) -> Result<Node> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(Node {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(CatalogError::MalformedDocument(
            "multiple root elements".into(),
        ));
    }
    Ok(())
}
