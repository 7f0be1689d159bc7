//! Full-text search over rendered content
//!
//! Searches every text node below a root, in document order, for a literal
//! case-insensitive query. Each hit carries its text node and character
//! offsets (so it can become an [`AnchoredRange`]) plus a short context
//! snippet for result lists.
//!
//! Matches never span text nodes: a query interrupted by markup
//! (`f<em>oo</em>`) is not found.

use std::collections::VecDeque;

use regex::{Regex, RegexBuilder};

use crate::anchor::AnchoredRange;
use crate::dom::DocumentTree;

/// Default number of characters kept on each side of a match.
pub const DEFAULT_CONTEXT_CHARS: usize = 100;

/// How snippets are cut and highlighted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// Characters kept before and after the match
    pub context_chars: usize,
    /// Marker added on a side where text was cut away
    pub ellipsis: String,
    pub highlight_open: String,
    pub highlight_close: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            context_chars: DEFAULT_CONTEXT_CHARS,
            ellipsis: "...".to_string(),
            highlight_open: "<mark>".to_string(),
            highlight_close: "</mark>".to_string(),
        }
    }
}

impl SearchOptions {
    pub fn with_context_chars(mut self, chars: usize) -> Self {
        self.context_chars = chars;
        self
    }

    pub fn with_ellipsis(mut self, ellipsis: impl Into<String>) -> Self {
        self.ellipsis = ellipsis.into();
        self
    }

    pub fn with_highlight(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.highlight_open = open.into();
        self.highlight_close = close.into();
        self
    }
}

/// One occurrence of the query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch<N> {
    /// Text node containing the match
    pub node: N,
    /// Character offset of the match start within the node's text
    pub start: usize,
    /// Character offset one past the match end
    pub end: usize,
    /// Text around the match, with ellipses where it was cut
    pub context: String,
    /// `context` with the match wrapped in highlight markers
    pub highlighted: String,
}

impl<N: Copy + Eq + core::fmt::Debug> SearchMatch<N> {
    /// The match as a persistable range.
    pub fn anchored_range<T>(&self, tree: &T) -> Option<AnchoredRange>
    where
        T: DocumentTree<Node = N>,
    {
        AnchoredRange::capture(tree, self.node, self.start, self.node, self.end)
    }
}

/// Lazy iterator over the matches of one query.
pub struct Matches<'t, T: DocumentTree> {
    tree: &'t T,
    pattern: Option<Regex>,
    options: SearchOptions,
    stack: Vec<T::Node>,
    pending: VecDeque<SearchMatch<T::Node>>,
}

impl<'t, T: DocumentTree> Matches<'t, T> {
    fn scan(&mut self, node: T::Node) {
        let Some(pattern) = self.pattern.as_ref() else {
            return;
        };
        let Some(text) = self.tree.text(node) else {
            return;
        };
        if text.is_empty() {
            return;
        }

        let total = text.chars().count();
        let mut chars_before = 0;
        let mut last_byte = 0;
        for m in pattern.find_iter(text) {
            if m.start() == m.end() {
                continue;
            }
            chars_before += text[last_byte..m.start()].chars().count();
            let start = chars_before;
            let end = start + m.as_str().chars().count();
            chars_before = end;
            last_byte = m.end();

            let (context, highlighted) = snippet(text, total, start, end, &self.options);
            self.pending.push_back(SearchMatch {
                node,
                start,
                end,
                context,
                highlighted,
            });
        }
    }
}

impl<T: DocumentTree> Iterator for Matches<'_, T> {
    type Item = SearchMatch<T::Node>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(found) = self.pending.pop_front() {
                return Some(found);
            }
            self.pattern.as_ref()?;
            let node = self.stack.pop()?;
            let mut children = self.tree.children(node);
            children.reverse();
            self.stack.extend(children);
            self.scan(node);
        }
    }
}

/// Search text below `root` for `query` with default options.
pub fn search<'t, T: DocumentTree>(tree: &'t T, root: T::Node, query: &str) -> Matches<'t, T> {
    search_with_options(tree, root, query, SearchOptions::default())
}

/// Search text below `root` for `query`.
///
/// An empty query yields nothing.
pub fn search_with_options<'t, T: DocumentTree>(
    tree: &'t T,
    root: T::Node,
    query: &str,
    options: SearchOptions,
) -> Matches<'t, T> {
    let pattern = if query.is_empty() {
        None
    } else {
        match RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                log::warn!("[SEARCH] Cannot build pattern for {:?}: {}", query, err);
                None
            }
        }
    };
    Matches {
        tree,
        pattern,
        options,
        stack: vec![root],
        pending: VecDeque::new(),
    }
}

/// Cut the context window around `start..end` (character offsets) and
/// build its highlighted copy.
fn snippet(
    text: &str,
    total: usize,
    start: usize,
    end: usize,
    options: &SearchOptions,
) -> (String, String) {
    let from = start.saturating_sub(options.context_chars);
    let to = end.saturating_add(options.context_chars).min(total);

    let byte = |char_index: usize| {
        text.char_indices()
            .nth(char_index)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    let (from_b, start_b, end_b, to_b) = (byte(from), byte(start), byte(end), byte(to));

    let lead = if from > 0 { options.ellipsis.as_str() } else { "" };
    let trail = if to < total { options.ellipsis.as_str() } else { "" };

    let context = format!("{}{}{}", lead, &text[from_b..to_b], trail);
    let highlighted = format!(
        "{}{}{}{}{}{}{}",
        lead,
        &text[from_b..start_b],
        options.highlight_open,
        &text[start_b..end_b],
        options.highlight_close,
        &text[end_b..to_b],
        trail
    );
    (context, highlighted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::resolve;
    use crate::dom::{Document, NodeId};

    const SENTENCE: &str = "the cat sat on the mat";

    fn single_text(text: &str) -> Document {
        let mut doc = Document::new();
        let root = doc.create_element("div", Vec::new());
        let document = doc.root();
        doc.append(document, root);
        doc.set_content_root(Some(root));
        doc.append_text(root, text);
        doc
    }

    fn run(doc: &Document, query: &str, options: SearchOptions) -> Vec<SearchMatch<NodeId>> {
        let root = doc.content_root().unwrap();
        search_with_options(doc, root, query, options).collect()
    }

    #[test]
    fn test_offsets_in_sentence() {
        let doc = single_text(SENTENCE);
        let hits = run(&doc, "at", SearchOptions::default());
        let offsets: Vec<(usize, usize)> = hits.iter().map(|m| (m.start, m.end)).collect();
        assert_eq!(offsets, [(5, 7), (9, 11), (20, 22)]);
        // Whole sentence fits inside the window: no ellipsis anywhere
        assert!(hits.iter().all(|m| m.context == SENTENCE));
        assert_eq!(hits[2].highlighted, "the cat sat on the m<mark>at</mark>");
    }

    #[test]
    fn test_case_insensitive() {
        let doc = single_text(SENTENCE);
        assert_eq!(run(&doc, "AT", SearchOptions::default()).len(), 3);
        assert_eq!(run(&doc, "The", SearchOptions::default()).len(), 2);
    }

    #[test]
    fn test_edge_context_clamps_without_ellipsis() {
        let doc = single_text(SENTENCE);
        let narrow = SearchOptions::default().with_context_chars(3);

        let hits = run(&doc, "at", narrow.clone());
        assert_eq!(hits[0].context, "...e cat sa...");
        assert_eq!(hits[0].highlighted, "...e c<mark>at</mark> sa...");
        assert_eq!(hits[2].context, "...e mat");
        assert_eq!(hits[2].highlighted, "...e m<mark>at</mark>");

        let first = run(&doc, "the", narrow);
        assert_eq!(first[0].start, 0);
        assert_eq!(first[0].context, "the ca...");
        assert_eq!(first[0].highlighted, "<mark>the</mark> ca...");
    }

    #[test]
    fn test_query_is_literal() {
        let doc = single_text("cost: $5.00 (approx.)");
        let hits = run(&doc, "$5.00 (", SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start, 6);
        assert!(run(&doc, "5.0.", SearchOptions::default()).is_empty());
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let doc = single_text(SENTENCE);
        assert!(run(&doc, "", SearchOptions::default()).is_empty());
    }

    #[test]
    fn test_offsets_count_characters_not_bytes() {
        let doc = single_text("café au lait, café noir");
        let hits = run(&doc, "café", SearchOptions::default());
        let starts: Vec<usize> = hits.iter().map(|m| m.start).collect();
        assert_eq!(starts, [0, 14]);
        assert_eq!(hits[1].end, 18);
    }

    #[test]
    fn test_document_order_across_nodes_and_custom_markers() {
        let doc = Document::parse(
            br#"<body><h1>Cats</h1><p>A <em>cat</em> and another cat.</p></body>"#,
        )
        .unwrap();
        let options = SearchOptions::default()
            .with_highlight("[", "]")
            .with_ellipsis("~");
        let hits = run(&doc, "cat", options);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].highlighted, "[Cat]s");
        assert_eq!(hits[1].highlighted, "[cat]");
        assert_eq!(hits[2].highlighted, " and another [cat].");
    }

    #[test]
    fn test_match_becomes_anchored_range() {
        let doc = Document::parse(br#"<body><p>one</p><p>the cat sat</p></body>"#).unwrap();
        let hits = run(&doc, "sat", SearchOptions::default());
        let range = hits[0].anchored_range(&doc).unwrap();
        assert_eq!(range.start.to_string(), "p:nth-child(2)$text$0");
        assert_eq!((range.start_offset, range.end_offset), (8, 11));
        assert_eq!(resolve(&doc, &range.end.to_string()), Some(hits[0].node));
    }

    #[test]
    fn test_search_is_restartable() {
        let doc = single_text(SENTENCE);
        let root = doc.content_root().unwrap();
        let mut first = search(&doc, root, "at");
        first.next();
        assert_eq!(search(&doc, root, "at").count(), 3);
    }
}
