//! Reflow-safe addresses for points in rendered content
//!
//! An anchor is a selector path from the content root down to an element,
//! optionally followed by a child-node index:
//!
//! ```text
//! #chapter-3 > p:nth-child(4) > em:nth-child(1)$text$0
//! ```
//!
//! Paths are structural, not positional, so they survive any change of
//! screen size, font or margins. They do not survive edits to the document
//! itself (removed nodes, reordered children).
//!
//! ```rust
//! use quire::anchor::{address, resolve};
//! use quire::dom::{Document, DocumentTree};
//!
//! let doc = Document::parse(b"<body><p>one</p><p>two</p></body>").unwrap();
//! let root = doc.content_root().unwrap();
//! let second = doc.children(root)[1];
//! let text = doc.children(second)[0];
//!
//! let addr = address(&doc, text).unwrap();
//! assert_eq!(addr, "p:nth-child(2)$text$0");
//! assert_eq!(resolve(&doc, &addr), Some(text));
//! ```

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::dom::DocumentTree;
use crate::error::AnchorParseError;

/// Separator between selector steps.
pub const STEP_SEPARATOR: &str = " > ";

/// Prefix of the trailing child-node index.
pub const TEXT_MARKER: &str = "$text$";

/// One step of an anchor path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// `#id`, looked up document-wide
    Id(String),
    /// `tag:nth-child(index)`, 1-based among element siblings
    NthChild { tag: String, index: usize },
}

/// Parsed anchor: selector steps plus an optional child-node index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Anchor {
    steps: Vec<Step>,
    text_index: Option<usize>,
}

impl Anchor {
    pub fn new(steps: Vec<Step>, text_index: Option<usize>) -> Self {
        Self { steps, text_index }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Index of the addressed child node, for text-level anchors.
    pub fn text_index(&self) -> Option<usize> {
        self.text_index
    }

    /// Compute the anchor of `node`.
    ///
    /// Returns `None` only when `node` is not below the content root.
    pub fn capture<T: DocumentTree>(tree: &T, node: T::Node) -> Option<Self> {
        let mut current = node;
        let mut text_index = None;

        if tree.tag_name(node).is_none() {
            let parent = tree.parent(node)?;
            let index = tree.children(parent).iter().position(|c| *c == node)?;
            text_index = Some(index);
            current = parent;
        }

        let mut steps = Vec::new();
        while !tree.is_content_root(current) {
            let tag = tree.tag_name(current)?;
            if let Some(id) = tree.id_attr(current).filter(|id| !id.is_empty()) {
                // Only a unique id can stand in for the rest of the path.
                if tree.element_by_id(id) == Some(current) {
                    steps.push(Step::Id(id.to_string()));
                    break;
                }
            }
            steps.push(Step::NthChild {
                tag: tag.to_ascii_lowercase(),
                index: element_index(tree, current),
            });
            current = tree.parent(current)?;
        }

        steps.reverse();
        Some(Self { steps, text_index })
    }

    /// Locate the addressed node.
    ///
    /// `None` covers both a malformed path and a path that no longer
    /// matches the document.
    pub fn resolve<T: DocumentTree>(&self, tree: &T) -> Option<T::Node> {
        let (mut current, rest) = match self.steps.split_first() {
            Some((Step::Id(id), rest)) => (tree.element_by_id(id)?, rest),
            _ => (tree.content_root()?, self.steps.as_slice()),
        };

        for step in rest {
            let Step::NthChild { tag, index } = step else {
                return None;
            };
            current = nth_element_child(tree, current, *index)?;
            if !tree.tag_name(current)?.eq_ignore_ascii_case(tag) {
                return None;
            }
        }

        match self.text_index {
            Some(index) => tree.children(current).get(index).copied(),
            None => Some(current),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(STEP_SEPARATOR)?;
            }
            match step {
                Step::Id(id) => write!(f, "#{}", css_escape(id))?,
                Step::NthChild { tag, index } => write!(f, "{}:nth-child({})", tag, index)?,
            }
        }
        if let Some(index) = self.text_index {
            write!(f, "{}{}", TEXT_MARKER, index)?;
        }
        Ok(())
    }
}

impl FromStr for Anchor {
    type Err = AnchorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |fragment: &str| AnchorParseError {
            fragment: fragment.to_string(),
        };

        let (path, text_index) = match s.rfind(TEXT_MARKER) {
            Some(at) => {
                let digits = &s[at + TEXT_MARKER.len()..];
                let index = digits.trim().parse().map_err(|_| malformed(digits))?;
                (&s[..at], Some(index))
            }
            None => (s, None),
        };

        let mut steps = Vec::new();
        for raw in split_steps(path) {
            steps.push(parse_step(raw).ok_or_else(|| malformed(raw))?);
        }
        if steps.iter().skip(1).any(|s| matches!(s, Step::Id(_))) {
            return Err(malformed(path));
        }
        Ok(Self { steps, text_index })
    }
}

/// Split a selector path on unescaped whitespace and `>` combinators.
fn split_steps(path: &str) -> Vec<&str> {
    let mut steps = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = path.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            start.get_or_insert(i);
            let mut hex = 0;
            while hex < 6 {
                match chars.peek() {
                    Some(&(_, h)) if h.is_ascii_hexdigit() => {
                        chars.next();
                        hex += 1;
                    }
                    _ => break,
                }
            }
            if hex == 0 {
                chars.next();
            } else if chars.peek().is_some_and(|&(_, w)| w.is_ascii_whitespace()) {
                chars.next();
            }
            continue;
        }
        if c.is_ascii_whitespace() || c == '>' {
            if let Some(s) = start.take() {
                steps.push(&path[s..i]);
            }
        } else {
            start.get_or_insert(i);
        }
    }
    if let Some(s) = start {
        steps.push(&path[s..]);
    }
    steps
}

fn parse_step(raw: &str) -> Option<Step> {
    if let Some(id) = raw.strip_prefix('#') {
        let id = css_unescape(id);
        return (!id.is_empty()).then_some(Step::Id(id));
    }
    let (tag, rest) = raw.split_once(":nth-child(")?;
    let index: usize = rest.strip_suffix(')')?.trim().parse().ok()?;
    let valid_tag = !tag.is_empty()
        && !tag
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '>' | '#' | '(' | ')' | '$' | '\\'));
    (valid_tag && index >= 1).then(|| Step::NthChild {
        tag: tag.to_ascii_lowercase(),
        index,
    })
}

/// 1-based position of `node` among its element siblings.
fn element_index<T: DocumentTree>(tree: &T, node: T::Node) -> usize {
    let mut index = 1;
    let mut sibling = tree.previous_sibling(node);
    while let Some(s) = sibling {
        if tree.tag_name(s).is_some() {
            index += 1;
        }
        sibling = tree.previous_sibling(s);
    }
    index
}

fn nth_element_child<T: DocumentTree>(tree: &T, parent: T::Node, index: usize) -> Option<T::Node> {
    tree.children(parent)
        .into_iter()
        .filter(|c| tree.tag_name(*c).is_some())
        .nth(index.checked_sub(1)?)
}

/// Address of `node` as a string. See [`Anchor::capture`].
pub fn address<T: DocumentTree>(tree: &T, node: T::Node) -> Option<String> {
    Anchor::capture(tree, node).map(|a| a.to_string())
}

/// Node addressed by `address`, if it parses and still matches.
pub fn resolve<T: DocumentTree>(tree: &T, address: &str) -> Option<T::Node> {
    address.parse::<Anchor>().ok()?.resolve(tree)
}

/// Escape an identifier for use after `#` in a selector.
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let chars: Vec<char> = ident.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{:x} ", code)),
            '0'..='9' if i == 0 || (i == 1 && chars[0] == '-') => {
                out.push_str(&format!("\\{:x} ", code))
            }
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Reverse of [`css_escape`] (and of any valid CSS identifier escape).
pub fn css_unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        if chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .filter(|v| *v != 0)
            .and_then(char::from_u32)
            .unwrap_or('\u{FFFD}');
        out.push(decoded);
    }
    out
}

/// A persisted selection: both ends as anchors plus offsets.
///
/// Offsets count characters when the end is a text node and child nodes
/// otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchoredRange {
    pub start: Anchor,
    pub start_offset: usize,
    pub end: Anchor,
    pub end_offset: usize,
}

/// An [`AnchoredRange`] resolved against a live tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange<N> {
    pub start: N,
    pub start_offset: usize,
    pub end: N,
    pub end_offset: usize,
}

impl AnchoredRange {
    pub fn capture<T: DocumentTree>(
        tree: &T,
        start: T::Node,
        start_offset: usize,
        end: T::Node,
        end_offset: usize,
    ) -> Option<Self> {
        Some(Self {
            start: Anchor::capture(tree, start)?,
            start_offset,
            end: Anchor::capture(tree, end)?,
            end_offset,
        })
    }

    /// Resolve both ends; fails when either end is gone or an offset no
    /// longer fits its node.
    pub fn resolve<T: DocumentTree>(&self, tree: &T) -> Option<ResolvedRange<T::Node>> {
        let start = self.start.resolve(tree)?;
        let end = self.end.resolve(tree)?;
        if self.start_offset > node_length(tree, start) || self.end_offset > node_length(tree, end)
        {
            return None;
        }
        Some(ResolvedRange {
            start,
            start_offset: self.start_offset,
            end,
            end_offset: self.end_offset,
        })
    }
}

fn node_length<T: DocumentTree>(tree: &T, node: T::Node) -> usize {
    match tree.text(node) {
        Some(text) => text.chars().count(),
        None => tree.children(node).len(),
    }
}
