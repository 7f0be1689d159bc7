//! Arena-backed document tree for addressing and search
//!
//! Anchors and search operate on the *rendered* content, which in a real
//! reader lives in a host-owned tree (a browser DOM, a layout engine).
//! [`DocumentTree`] is the small capability surface those algorithms need;
//! [`Document`] is the in-memory implementation used by the library itself
//! and by tests.
//!
//! Nodes live in one contiguous vector and link to each other by index.
//! Text runs split by entity references are merged into a single text node,
//! so child indices match what a browser reports.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::Debug;
use quick_xml::events::Event;

use crate::error::EpubError;
use crate::xml;

/// Class carried by the element that anchors are relative to.
pub const CONTENT_ROOT_CLASS: &str = "text-epub";

/// Class of the per-chapter wrapper created by [`Document::assemble`].
pub const CHAPTER_BODY_CLASS: &str = "chapter-body";

/// Id of the empty marker element placed before the first chapter.
pub const START_MARKER_ID: &str = "text-epub-start";

/// Read-only view of a rendered content tree.
///
/// Text and comment nodes report `None` from [`tag_name`](Self::tag_name);
/// only text nodes report `Some` from [`text`](Self::text).
pub trait DocumentTree {
    /// Handle to a node. Cheap to copy and compare.
    type Node: Copy + Eq + Debug;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node>;
    /// All child nodes (elements, text and comments) in document order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;
    /// Lower-case tag name of an element.
    fn tag_name(&self, node: Self::Node) -> Option<&str>;
    fn id_attr(&self, node: Self::Node) -> Option<&str>;
    fn text(&self, node: Self::Node) -> Option<&str>;
    fn is_content_root(&self, node: Self::Node) -> bool;
    fn content_root(&self) -> Option<Self::Node>;
    /// First element in document order with the given id.
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;
}

/// Index of a node in a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Payload of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    /// Synthetic root above the document element
    Document,
    Element {
        /// Lower-cased local name
        name: String,
        /// Attributes as written (qualified names)
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Arena-allocated document tree.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
    content_root: Option<NodeId>,
    id_map: BTreeMap<String, NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the synthetic root.
    pub fn new() -> Self {
        Self {
            nodes: alloc::vec![Node::new(NodeData::Document)],
            content_root: None,
            id_map: BTreeMap::new(),
        }
    }

    /// Parse XHTML markup.
    ///
    /// The content root is the first element carrying the content-root
    /// class, else `<body>`, else the document element.
    pub fn parse(markup: &[u8]) -> Result<Self, EpubError> {
        let mut reader = xml::lenient_reader(markup);
        let mut doc = Document::new();
        let mut stack: Vec<NodeId> = alloc::vec![doc.root()];

        loop {
            let parent = stack.last().copied().unwrap_or(NodeId(0));
            match reader.read_event()? {
                Event::Start(e) => {
                    let node = doc.create_element(&xml::local_name(&e), xml::attrs(&e, &reader));
                    doc.append(parent, node);
                    stack.push(node);
                }
                Event::Empty(e) => {
                    let node = doc.create_element(&xml::local_name(&e), xml::attrs(&e, &reader));
                    doc.append(parent, node);
                }
                Event::End(_) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Event::Text(e) => doc.append_text(parent, &xml::text(&e)?),
                Event::CData(e) => doc.append_text(parent, &String::from_utf8_lossy(&e)),
                Event::GeneralRef(e) => doc.append_text(parent, &xml::general_ref(&e)),
                Event::Comment(e) => {
                    let node = doc.alloc(NodeData::Comment(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                    doc.append(parent, node);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let content_root = doc
            .find_element(|d, n| d.has_class(n, CONTENT_ROOT_CLASS))
            .or_else(|| doc.find_element(|d, n| d.tag(n) == Some("body")))
            .or_else(|| doc.children_of(doc.root()).find(|n| doc.tag(*n).is_some()));
        doc.content_root = content_root;
        Ok(doc)
    }

    /// Stitch chapters into one document under a content-root `div`.
    ///
    /// Each chapter's content root (its `<body>`) is copied into a
    /// `div` whose id is the chapter key and whose classes are
    /// `chapter-body` plus the body's own classes. A body id survives as an
    /// empty `span` with that id. The first chapter is preceded by an empty
    /// `div#text-epub-start`.
    pub fn assemble<'a, I>(chapters: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Document)>,
    {
        let mut doc = Document::new();
        let root = doc.create_element(
            "div",
            alloc::vec![("class".to_string(), CONTENT_ROOT_CLASS.to_string())],
        );
        let document = doc.root();
        doc.append(document, root);
        doc.content_root = Some(root);

        for (index, (key, chapter)) in chapters.into_iter().enumerate() {
            if index == 0 {
                let start = doc.create_element(
                    "div",
                    alloc::vec![("id".to_string(), START_MARKER_ID.to_string())],
                );
                doc.append(root, start);
            }
            let Some(body) = chapter.content_root else {
                continue;
            };

            let mut class = CHAPTER_BODY_CLASS.to_string();
            if let Some(own) = chapter.attr(body, "class") {
                class.push(' ');
                class.push_str(own);
            }
            let wrapper = doc.create_element(
                "div",
                alloc::vec![("id".to_string(), key.to_string()), ("class".to_string(), class)],
            );
            doc.append(root, wrapper);

            if let Some(body_id) = chapter.attr(body, "id") {
                let span = doc.create_element(
                    "span",
                    alloc::vec![("id".to_string(), body_id.to_string())],
                );
                doc.append(wrapper, span);
            }
            for child in chapter.children_of(body) {
                doc.copy_subtree(chapter, child, wrapper);
            }
        }
        doc
    }

    /// The synthetic document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, including the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.node(node).map(|n| &n.data)
    }

    /// Override the content root.
    pub fn set_content_root(&mut self, node: Option<NodeId>) {
        self.content_root = node;
    }

    /// Attribute value by qualified name, falling back to local name.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        let NodeData::Element { attrs, .. } = &self.node(node)?.data else {
            return None;
        };
        attrs
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| {
                attrs
                    .iter()
                    .find(|(k, _)| k.rsplit_once(':').is_some_and(|(_, local)| local == name))
            })
            .map(|(_, v)| v.as_str())
    }

    /// True when the element's `class` list contains `class`.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// Iterate child nodes in document order.
    pub fn children_of(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = self.node(node).and_then(|n| n.first_child);
        core::iter::from_fn(move || {
            let current = next?;
            next = self.node(current).and_then(|n| n.next_sibling);
            Some(current)
        })
    }

    /// All nodes below `node` in document order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children_of(node).collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            out.push(current);
            let before = stack.len();
            stack.extend(self.children_of(current));
            stack[before..].reverse();
        }
        out
    }

    /// Concatenated text of all text nodes below `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeData::Text(text)) = self.data(node) {
            out.push_str(text);
        }
        for child in self.descendants(node) {
            if let Some(NodeData::Text(text)) = self.data(child) {
                out.push_str(text);
            }
        }
        out
    }

    /// Allocate a detached element. The name is lower-cased.
    pub fn create_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.alloc(NodeData::Element {
            name: name.to_ascii_lowercase(),
            attrs,
        })
    }

    /// Allocate a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// `child` must be detached. Ids become visible to
    /// [`element_by_id`](DocumentTree::element_by_id) once attached; the
    /// first element attached with a given id wins.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let Some(last) = self.node(parent).map(|p| p.last_child) else {
            return;
        };
        if self.node(child).is_none() || parent == child {
            return;
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = last;
            node.next_sibling = None;
        }
        match last {
            Some(last) => {
                if let Some(node) = self.node_mut(last) {
                    node.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(node) = self.node_mut(parent) {
                    node.first_child = Some(child);
                }
            }
        }
        if let Some(node) = self.node_mut(parent) {
            node.last_child = Some(child);
        }
        if let Some(id) = self.attr(child, "id").map(ToString::to_string) {
            self.id_map.entry(id).or_insert(child);
        }
    }

    /// Append text to `parent`, merging with a trailing text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        let last = self.node(parent).and_then(|p| p.last_child);
        if let Some(last) = last {
            if let Some(Node {
                data: NodeData::Text(existing),
                ..
            }) = self.node_mut(last)
            {
                existing.push_str(text);
                return;
            }
        }
        let node = self.create_text(text);
        self.append(parent, node);
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.data {
            NodeData::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    fn find_element(&self, pred: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.tag(*n).is_some() && pred(self, *n))
    }

    fn copy_subtree(&mut self, source: &Document, node: NodeId, parent: NodeId) {
        let Some(data) = source.data(node).cloned() else {
            return;
        };
        let copy = self.alloc(data);
        self.append(parent, copy);
        for child in source.children_of(node) {
            self.copy_subtree(source, child, copy);
        }
    }
}

impl DocumentTree for Document {
    type Node = NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.prev_sibling
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.children_of(node).collect()
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.tag(node)
    }

    fn id_attr(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id")
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.data {
            NodeData::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn is_content_root(&self, node: NodeId) -> bool {
        self.content_root == Some(node)
    }

    fn content_root(&self) -> Option<NodeId> {
        self.content_root
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>One</title></head>
<body id="b1" class="calibre">
<h1 id="top">Chapter One</h1>
<p>Fish &amp; chips<!-- note --> tonight</p>
<p><em>Emphasis</em> after</p>
</body>
</html>"#;

    fn element_children(doc: &Document, node: NodeId) -> Vec<NodeId> {
        doc.children_of(node)
            .filter(|n| doc.tag_name(*n).is_some())
            .collect()
    }

    #[test]
    fn test_parse_finds_body_as_content_root() {
        let doc = Document::parse(CHAPTER.as_bytes()).unwrap();
        let root = doc.content_root().unwrap();
        assert_eq!(doc.tag_name(root), Some("body"));
        assert!(doc.is_content_root(root));
        assert_eq!(element_children(&doc, root).len(), 3);
    }

    #[test]
    fn test_marker_class_wins_over_body() {
        let doc = Document::parse(
            br#"<html><body><div class="wrapper text-epub"><p>x</p></div></body></html>"#,
        )
        .unwrap();
        let root = doc.content_root().unwrap();
        assert_eq!(doc.tag_name(root), Some("div"));
        assert!(doc.has_class(root, CONTENT_ROOT_CLASS));
    }

    #[test]
    fn test_text_merges_entity_runs_and_keeps_comments() {
        let doc = Document::parse(CHAPTER.as_bytes()).unwrap();
        let root = doc.content_root().unwrap();
        let p = element_children(&doc, root)[1];
        let children = doc.children(p);
        assert_eq!(children.len(), 3);
        assert_eq!(doc.text(children[0]), Some("Fish & chips"));
        assert!(matches!(doc.data(children[1]), Some(NodeData::Comment(_))));
        assert_eq!(doc.text(children[2]), Some(" tonight"));
        assert_eq!(doc.tag_name(children[0]), None);
    }

    #[test]
    fn test_sibling_and_parent_links() {
        let doc = Document::parse(CHAPTER.as_bytes()).unwrap();
        let root = doc.content_root().unwrap();
        let kids = doc.children(root);
        assert_eq!(doc.previous_sibling(kids[0]), None);
        assert_eq!(doc.previous_sibling(kids[1]), Some(kids[0]));
        assert!(kids.iter().all(|k| doc.parent(*k) == Some(root)));
    }

    #[test]
    fn test_element_by_id_first_wins() {
        let doc =
            Document::parse(br#"<body><p id="x">a</p><p id="x">b</p></body>"#).unwrap();
        let first = doc.element_by_id("x").unwrap();
        assert_eq!(doc.text_content(first), "a");
        assert_eq!(doc.element_by_id("missing"), None);
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let doc = Document::parse(CHAPTER.as_bytes()).unwrap();
        let root = doc.content_root().unwrap();
        let p = element_children(&doc, root)[2];
        assert_eq!(doc.text_content(p), "Emphasis after");
    }

    #[test]
    fn test_assemble_wraps_chapters() {
        let one = Document::parse(CHAPTER.as_bytes()).unwrap();
        let two = Document::parse(br#"<html><body><p>Second</p></body></html>"#).unwrap();
        let doc = Document::assemble([("OEBPS/one.xhtml", &one), ("OEBPS/two.xhtml", &two)]);

        let root = doc.content_root().unwrap();
        assert!(doc.has_class(root, CONTENT_ROOT_CLASS));
        let kids = element_children(&doc, root);
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.id_attr(kids[0]), Some(START_MARKER_ID));

        let first = doc.element_by_id("OEBPS/one.xhtml").unwrap();
        assert_eq!(first, kids[1]);
        assert!(doc.has_class(first, CHAPTER_BODY_CLASS));
        assert!(doc.has_class(first, "calibre"));
        assert!(doc.element_by_id("b1").is_some());
        assert!(doc.element_by_id("top").is_some());

        let second = doc.element_by_id("OEBPS/two.xhtml").unwrap();
        assert_eq!(doc.text_content(second), "Second");
    }

    #[test]
    fn test_append_rejects_unknown_nodes() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append(root, NodeId(42));
        assert!(doc.children(root).is_empty());
        assert!(doc.is_empty());
    }
}
