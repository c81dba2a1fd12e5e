// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory page/text-node tree built from pdftohtml's XML layout markup.
//
// Nodes live in an arena and refer to each other by index: children are
// owned through the arena, the parent link is a plain index back-reference.

use std::borrow::Cow;
use std::fmt;

use docclip_core::error::{ClipperError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

pub const PAGE_TAG_NAME: &str = "page";
pub const TEXT_TAG_NAME: &str = "text";
pub const IMAGE_TAG_NAME: &str = "image";

/// Name reported for character-data nodes.
const CONTENT_NODE_NAME: &str = "#text";

/// Index of a node inside its [`StructuredTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A `<page>` element.
    Page,
    /// A `<text>` element: a positioned run of text.
    Text,
    /// Any other element (`<pdf2xml>`, `<fontspec>`, `<image>`, `<b>`, ...).
    Element(String),
    /// Character data.
    Content(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A fully parsed structural tree. Construction either succeeds completely
/// or fails; a partially built tree is never handed out.
#[derive(Debug, Clone)]
pub struct StructuredTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl StructuredTree {
    /// Parse XML layout markup.
    ///
    /// Fails with [`ClipperError::Parse`] on mismatched or unclosed tags,
    /// malformed attributes or escapes, content outside the root element, or
    /// a document without a root element.
    pub fn parse(markup: &str) -> Result<Self> {
        let mut reader = Reader::from_str(markup);
        reader.trim_text(false);

        let mut nodes: Vec<NodeData> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            let event = reader.read_event().map_err(|err| {
                ClipperError::Parse(format!("at byte {}: {}", reader.buffer_position(), err))
            })?;

            match event {
                Event::Start(start) => {
                    let id = push_element(&mut nodes, &stack, &mut root, &start)?;
                    stack.push(id);
                }
                Event::Empty(start) => {
                    push_element(&mut nodes, &stack, &mut root, &start)?;
                }
                Event::End(_) => {
                    // quick-xml has already checked the end name matches.
                    stack.pop();
                }
                Event::Text(text) => {
                    let content = text
                        .unescape()
                        .map_err(|err| ClipperError::Parse(format!("bad text escape: {err}")))?;
                    push_content(&mut nodes, &stack, content)?;
                }
                Event::CData(data) => {
                    let content = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    push_content(&mut nodes, &stack, Cow::Owned(content))?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype.
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ClipperError::Parse(format!(
                "element <{}> is never closed",
                nodes[open.0].kind.name()
            )));
        }

        let root = root.ok_or_else(|| ClipperError::Parse("no root element".into()))?;
        debug!(nodes = nodes.len(), "Structured tree parsed");
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    /// Handle for `id`, or `None` when `id` does not belong to this tree.
    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        (id.0 < self.nodes.len()).then(|| self.node(id))
    }

    // Ids handed out by this tree are always in range.
    fn node(&self, id: NodeId) -> Node<'_> {
        debug_assert!(id.0 < self.nodes.len(), "node id out of range");
        Node { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All `<page>` elements in document order.
    pub fn pages(&self) -> Vec<Node<'_>> {
        self.root()
            .descendants_and_self()
            .filter(|node| node.is_page())
            .collect()
    }

    /// All elements with the given tag name, in document order.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
        self.root()
            .descendants_and_self()
            .filter(move |node| !node.is_content() && node.name() == name)
    }
}

fn push_element(
    nodes: &mut Vec<NodeData>,
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    start: &BytesStart<'_>,
) -> Result<NodeId> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|err| ClipperError::Parse(format!("bad attribute on <{name}>: {err}")))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| ClipperError::Parse(format!("bad attribute value on <{name}>: {err}")))?
            .into_owned();
        attributes.push((key, value));
    }

    let kind = if name == PAGE_TAG_NAME {
        NodeKind::Page
    } else if name == TEXT_TAG_NAME {
        NodeKind::Text
    } else {
        NodeKind::Element(name)
    };

    let parent = stack.last().copied();
    if parent.is_none() {
        if root.is_some() {
            return Err(ClipperError::Parse(format!(
                "second root element <{}>",
                kind.name()
            )));
        }
        *root = Some(NodeId(nodes.len()));
    }

    Ok(attach(nodes, parent, kind, attributes))
}

fn push_content(nodes: &mut Vec<NodeData>, stack: &[NodeId], content: Cow<'_, str>) -> Result<()> {
    let Some(&parent) = stack.last() else {
        if content.trim().is_empty() {
            return Ok(());
        }
        return Err(ClipperError::Parse("text outside the root element".into()));
    };

    // Layout whitespace between elements carries nothing; whitespace inside
    // a text run is content.
    let inside_text = stack.iter().any(|id| nodes[id.0].kind == NodeKind::Text);
    if content.trim().is_empty() && !inside_text {
        return Ok(());
    }

    attach(nodes, Some(parent), NodeKind::Content(content.into_owned()), Vec::new());
    Ok(())
}

fn attach(
    nodes: &mut Vec<NodeData>,
    parent: Option<NodeId>,
    kind: NodeKind,
    attributes: Vec<(String, String)>,
) -> NodeId {
    let id = NodeId(nodes.len());
    nodes.push(NodeData {
        kind,
        attributes,
        parent,
        children: Vec::new(),
    });
    if let Some(parent) = parent {
        nodes[parent.0].children.push(id);
    }
    id
}

impl NodeKind {
    /// Tag name for elements, `#text` for character data.
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Page => PAGE_TAG_NAME,
            NodeKind::Text => TEXT_TAG_NAME,
            NodeKind::Element(name) => name,
            NodeKind::Content(_) => CONTENT_NODE_NAME,
        }
    }
}

/// Borrowed handle to one node of a [`StructuredTree`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a StructuredTree,
    id: NodeId,
}

impl<'a> Node<'a> {
    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.data().kind
    }

    pub fn name(&self) -> &'a str {
        self.data().kind.name()
    }

    pub fn is_page(&self) -> bool {
        matches!(self.kind(), NodeKind::Page)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind(), NodeKind::Text)
    }

    pub fn is_content(&self) -> bool {
        matches!(self.kind(), NodeKind::Content(_))
    }

    /// Character data of a content node.
    pub fn content(&self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Content(text) => Some(text),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute parsed as a float; `default` when absent or not a number.
    pub fn float_attr(&self, name: &str, default: f64) -> f64 {
        self.attr(name)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .unwrap_or(default)
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| tree.node(id))
    }

    /// All nodes below this one, in document order.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants {
            tree: self.tree,
            stack: self.data().children.iter().rev().copied().collect(),
        }
    }

    fn descendants_and_self(&self) -> Descendants<'a> {
        Descendants {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// Concatenated character data of this node and everything below it.
    pub fn text(&self) -> String {
        if let Some(content) = self.content() {
            return content.to_owned();
        }
        self.descendants().filter_map(|node| node.content()).collect()
    }

    /// This node or its closest ancestor of kind `text`.
    pub fn nearest_text_ancestor(&self) -> Option<Node<'a>> {
        let mut current = Some(*self);
        while let Some(node) = current {
            if node.is_text() {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", self.kind())
            .field("attributes", &self.data().attributes)
            .finish()
    }
}

/// Pre-order walk below a node.
pub struct Descendants<'a> {
    tree: &'a StructuredTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let children = &self.tree.nodes[id.0].children;
        self.stack.extend(children.iter().rev().copied());
        Some(self.tree.node(id))
    }
}
