//! Table of contents parsing for both navigation dialects
//!
//! Two historical formats are unified into one [`NavPoint`] tree:
//!
//! - [`NavDialect::LegacyOrdered`]: the EPUB 2 NCX `navMap`, whose sibling
//!   order is given by `playOrder`.
//! - [`NavDialect::HypertextList`]: the EPUB 3 XHTML `nav` document, whose
//!   nested `ol/li` document order is authoritative.
//!
//! Every target is resolved relative to the navigation resource into a
//! canonical `epub://` URI, so consumers never need to know which dialect
//! produced a tree.
//!
//! # Usage
//!
//! ```rust
//! use quire::navigation::{parse_navigation, NavDialect};
//!
//! # fn example() -> Result<(), quire::error::EpubError> {
//! let ncx = br#"<ncx><navMap>
//!   <navPoint playOrder="1"><navLabel><text>One</text></navLabel>
//!     <content src="ch1.xhtml"/></navPoint>
//! </navMap></ncx>"#;
//! let nav = parse_navigation(ncx, NavDialect::LegacyOrdered, "OEBPS/toc.ncx")?;
//! assert_eq!(nav.toc[0].target, "epub://OEBPS/ch1.xhtml");
//! # Ok(())
//! # }
//! ```

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::EpubError;
use crate::package::{Package, Resource};
use crate::uri;
use crate::xml;

/// Media type of legacy NCX documents
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Media type of XHTML navigation documents
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// The two navigation-document dialects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NavDialect {
    /// NCX `navMap` with `playOrder`-sorted siblings
    LegacyOrdered,
    /// XHTML `nav` with nested ordered lists
    HypertextList,
}

impl NavDialect {
    /// Dialect implied by a manifest media type, when unambiguous.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim() {
            NCX_MEDIA_TYPE => Some(NavDialect::LegacyOrdered),
            XHTML_MEDIA_TYPE => Some(NavDialect::HypertextList),
            _ => None,
        }
    }
}

/// A single navigation point (table of contents entry)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavPoint {
    /// Display label for this navigation point
    pub label: String,
    /// Canonical target URI (`epub://path[#fragment]`, or an external link)
    pub target: String,
    /// Child navigation points
    pub children: Vec<NavPoint>,
    /// `playOrder` as written in a legacy document
    pub play_order: Option<i32>,
    /// Page computed by a pagination pass; never set by parsing
    pub page: Option<u32>,
}

impl NavPoint {
    /// Create a leaf navigation point.
    pub fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
            children: Vec::new(),
            play_order: None,
            page: None,
        }
    }

    /// Archive path of the target, without scheme or fragment.
    pub fn path(&self) -> &str {
        uri::split_fragment(uri::strip_scheme(&self.target)).0
    }

    /// Fragment of the target, if any.
    pub fn fragment(&self) -> Option<&str> {
        uri::split_fragment(&self.target).1
    }
}

/// Complete navigation structure for a publication
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Table of contents entries
    pub toc: Vec<NavPoint>,
    /// Page list entries (mapping to print page numbers)
    pub page_list: Vec<NavPoint>,
    /// Landmark entries (cover, toc, bodymatter, ...)
    pub landmarks: Vec<NavPoint>,
}

impl Navigation {
    /// Create an empty navigation structure
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the navigation has any TOC entries
    pub fn has_toc(&self) -> bool {
        !self.toc.is_empty()
    }

    /// Get total number of TOC entries (including nested)
    pub fn toc_count(&self) -> usize {
        count_nav_points(&self.toc)
    }

    /// Flatten the TOC into a linear list of (depth, NavPoint) pairs
    pub fn toc_flat(&self) -> Vec<(usize, &NavPoint)> {
        let mut result = Vec::new();
        flatten_nav_points(&self.toc, 0, &mut result);
        result
    }

    /// TOC entries in document order (depth-first, parents first)
    pub fn flatten(&self) -> Vec<&NavPoint> {
        flatten(&self.toc)
    }

    /// First TOC entry whose target equals `target`
    pub fn find_by_target(&self, target: &str) -> Option<&NavPoint> {
        self.flatten().into_iter().find(|p| p.target == target)
    }
}

/// Flatten a NavPoint forest into document order.
pub fn flatten(points: &[NavPoint]) -> Vec<&NavPoint> {
    let mut result = Vec::new();
    let mut stack: Vec<&NavPoint> = points.iter().rev().collect();
    while let Some(point) = stack.pop() {
        result.push(point);
        stack.extend(point.children.iter().rev());
    }
    result
}

/// Count all navigation points recursively
fn count_nav_points(points: &[NavPoint]) -> usize {
    points
        .iter()
        .map(|p| 1 + count_nav_points(&p.children))
        .sum()
}

/// Flatten navigation points into a list with depth info
fn flatten_nav_points<'a>(
    points: &'a [NavPoint],
    depth: usize,
    result: &mut Vec<(usize, &'a NavPoint)>,
) {
    for point in points {
        result.push((depth, point));
        flatten_nav_points(&point.children, depth + 1, result);
    }
}

/// Navigation resources worth trying, in priority order, with the dialect
/// each should be parsed as.
///
/// Conventional manifest ids come first (`toc.ncx`, `ncx`, `nav`, `toc`),
/// then `spine@toc`, then an item with the `nav` property, then any NCX.
/// The resource's media type overrides the guessed dialect.
pub fn navigation_candidates(package: &Package) -> Vec<(&Resource, NavDialect)> {
    let ordered: [(Option<&Resource>, NavDialect); 7] = [
        (package.resource("toc.ncx"), NavDialect::LegacyOrdered),
        (package.resource("ncx"), NavDialect::LegacyOrdered),
        (package.resource("nav"), NavDialect::HypertextList),
        (package.resource("toc"), NavDialect::HypertextList),
        (
            package.spine().toc_id().and_then(|id| package.resource(id)),
            NavDialect::LegacyOrdered,
        ),
        (
            package.resources().iter().find(|r| r.has_property("nav")),
            NavDialect::HypertextList,
        ),
        (
            package
                .resources()
                .iter()
                .find(|r| r.media_type == NCX_MEDIA_TYPE),
            NavDialect::LegacyOrdered,
        ),
    ];

    let mut candidates: Vec<(&Resource, NavDialect)> = Vec::new();
    for (resource, guess) in ordered {
        let Some(resource) = resource else {
            continue;
        };
        if candidates.iter().any(|(r, _)| r.id == resource.id) {
            continue;
        }
        let dialect = NavDialect::from_media_type(&resource.media_type).unwrap_or(guess);
        candidates.push((resource, dialect));
    }
    candidates
}

/// First navigation candidate, if the package declares any.
pub fn locate_navigation(package: &Package) -> Option<(&Resource, NavDialect)> {
    navigation_candidates(package).into_iter().next()
}

/// Parse a navigation document of the given dialect located at `nav_path`.
pub fn parse_navigation(
    content: &[u8],
    dialect: NavDialect,
    nav_path: &str,
) -> Result<Navigation, EpubError> {
    match dialect {
        NavDialect::LegacyOrdered => parse_legacy_ncx(content, nav_path),
        NavDialect::HypertextList => parse_hypertext_nav(content, nav_path),
    }
}

/// Collapse whitespace runs and trim.
fn normalize_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sort one sibling level by `playOrder` (missing counts as 0), stably.
fn sort_by_play_order(points: &mut [NavPoint]) {
    points.sort_by_key(|p| p.play_order.unwrap_or(0));
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LegacyKind {
    NavPoint,
    PageTarget,
}

/// A `navPoint` or `pageTarget` whose end tag has not been seen yet
struct PartialLegacy {
    kind: LegacyKind,
    /// Length of the element stack when this element was opened
    depth: usize,
    label: String,
    label_done: bool,
    src: Option<String>,
    play_order: Option<i32>,
    children: Vec<NavPoint>,
}

/// Parse a legacy NCX navigation document
///
/// `navMap` is required and every `navPoint` needs a `content@src` child.
/// Each sibling level is sorted by `playOrder`. `pageList/pageTarget`
/// entries without a target are skipped.
pub fn parse_legacy_ncx(content: &[u8], nav_path: &str) -> Result<Navigation, EpubError> {
    let mut reader = xml::lenient_reader(content);

    let mut nav = Navigation::new();
    let mut stack: Vec<String> = Vec::new();
    let mut open: Vec<PartialLegacy> = Vec::new();
    let mut seen_nav_map = false;
    let mut in_nav_map = false;
    let mut in_page_list = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = xml::local_name(&e);
                legacy_open(
                    &e,
                    &reader,
                    &name,
                    &stack,
                    &mut open,
                    &mut seen_nav_map,
                    &mut in_nav_map,
                    &mut in_page_list,
                );
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = xml::local_name(&e);
                match name.as_str() {
                    "navMap" => seen_nav_map = true,
                    "content" => {
                        if let Some(partial) = open.last_mut() {
                            if stack.len() == partial.depth + 1 && partial.src.is_none() {
                                partial.src = xml::attr(&e, &reader, "src");
                            }
                        }
                    }
                    "navPoint" if in_nav_map => {
                        return Err(EpubError::InvalidNavigationDocument(
                            "navPoint has no content child".to_string(),
                        ));
                    }
                    _ => {}
                }
            }
            Event::Text(e) => legacy_text(&stack, &mut open, &xml::text(&e)?),
            Event::CData(e) => legacy_text(&stack, &mut open, &String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => legacy_text(&stack, &mut open, &xml::general_ref(&e)),
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                match name.as_str() {
                    "navMap" => in_nav_map = false,
                    "pageList" => in_page_list = false,
                    "navLabel" => {
                        if let Some(partial) = open.last_mut() {
                            if stack.len() == partial.depth + 1 && !partial.label.trim().is_empty()
                            {
                                partial.label_done = true;
                            }
                        }
                    }
                    "navPoint" | "pageTarget" => {
                        if open.last().is_some_and(|p| p.depth == stack.len()) {
                            if let Some(partial) = open.pop() {
                                legacy_close(partial, nav_path, &mut open, &mut nav)?;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_nav_map {
        return Err(EpubError::InvalidNavigationDocument(
            "NCX document has no navMap".to_string(),
        ));
    }

    sort_by_play_order(&mut nav.toc);
    log::debug!(
        "[NAV] Parsed NCX '{}': {} entries, {} page targets",
        nav_path,
        nav.toc_count(),
        nav.page_list.len()
    );
    Ok(nav)
}

#[allow(clippy::too_many_arguments)]
fn legacy_open(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    name: &str,
    stack: &[String],
    open: &mut Vec<PartialLegacy>,
    seen_nav_map: &mut bool,
    in_nav_map: &mut bool,
    in_page_list: &mut bool,
) {
    let kind = match name {
        "navMap" => {
            *seen_nav_map = true;
            *in_nav_map = true;
            return;
        }
        "pageList" => {
            *in_page_list = true;
            return;
        }
        "content" => {
            if let Some(partial) = open.last_mut() {
                if stack.len() == partial.depth + 1 && partial.src.is_none() {
                    partial.src = xml::attr(e, reader, "src");
                }
            }
            return;
        }
        "navPoint" if *in_nav_map => LegacyKind::NavPoint,
        "pageTarget" if *in_page_list => LegacyKind::PageTarget,
        _ => return,
    };
    let play_order = xml::attr(e, reader, "playOrder").and_then(|v| v.trim().parse().ok());
    open.push(PartialLegacy {
        kind,
        depth: stack.len(),
        label: String::new(),
        label_done: false,
        src: None,
        play_order,
        children: Vec::new(),
    });
}

/// Append text that sits in `navLabel/text` directly under the open point.
fn legacy_text(stack: &[String], open: &mut [PartialLegacy], text: &str) {
    let Some(partial) = open.last_mut() else {
        return;
    };
    let d = partial.depth;
    if partial.label_done || stack.len() != d + 3 {
        return;
    }
    if stack[d + 1] == "navLabel" && stack[d + 2] == "text" {
        partial.label.push_str(text);
    }
}

fn legacy_close(
    partial: PartialLegacy,
    nav_path: &str,
    open: &mut [PartialLegacy],
    nav: &mut Navigation,
) -> Result<(), EpubError> {
    let label = normalize_label(&partial.label);
    let src = match partial.src.as_deref().map(str::trim) {
        Some(src) if !src.is_empty() => src,
        _ if partial.kind == LegacyKind::PageTarget => {
            log::warn!("[NAV] Skipping pageTarget '{}' without content src", label);
            return Ok(());
        }
        _ => {
            return Err(EpubError::InvalidNavigationDocument(format!(
                "navPoint '{}' has no content src",
                label
            )))
        }
    };

    let mut children = partial.children;
    sort_by_play_order(&mut children);
    let point = NavPoint {
        label,
        target: uri::resolve_href(nav_path, src),
        children,
        play_order: partial.play_order,
        page: None,
    };

    match partial.kind {
        LegacyKind::PageTarget => nav.page_list.push(point),
        LegacyKind::NavPoint => match open
            .iter_mut()
            .rev()
            .find(|p| p.kind == LegacyKind::NavPoint)
        {
            Some(parent) => parent.children.push(point),
            None => nav.toc.push(point),
        },
    }
    Ok(())
}

/// Which element introduced a list item's label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemHead {
    None,
    Anchor,
    Span,
}

/// A `<li>` whose end tag has not been seen yet
struct PartialItem {
    /// Length of the element stack when the `<li>` was opened
    depth: usize,
    head: ItemHead,
    href: Option<String>,
    label: String,
    children: Vec<NavPoint>,
}

/// Everything collected from one `<nav>` element
#[derive(Default)]
struct ParsedNav {
    types: Vec<String>,
    has_list: bool,
    items: Vec<NavPoint>,
    error: Option<String>,
}

impl ParsedNav {
    fn has_type(&self, wanted: &str) -> bool {
        self.types.iter().any(|t| t == wanted)
    }
}

/// Parse an XHTML navigation document
///
/// The `nav` typed `toc` (or the first `nav` when none is typed) must hold
/// an `ol`. Each `li` is headed by an `a` carrying the target and label; an
/// `li` headed by a `span` inherits the target of its first child. `nav`s
/// typed `landmarks` and `page-list` are collected alongside.
pub fn parse_hypertext_nav(content: &[u8], nav_path: &str) -> Result<Navigation, EpubError> {
    let mut reader = xml::lenient_reader(content);

    let mut navs: Vec<ParsedNav> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    // Stack length at which the current <nav> was opened
    let mut nav_depth: Option<usize> = None;
    let mut items: Vec<PartialItem> = Vec::new();
    // Stack length at which the current label element was opened
    let mut label_depth: Option<usize> = None;

    loop {
        let (e, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::Text(e) => {
                push_label_text(label_depth, &mut items, &xml::text(&e)?);
                continue;
            }
            Event::CData(e) => {
                push_label_text(label_depth, &mut items, &String::from_utf8_lossy(&e));
                continue;
            }
            Event::GeneralRef(e) => {
                push_label_text(label_depth, &mut items, &xml::general_ref(&e));
                continue;
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                if label_depth == Some(stack.len()) {
                    label_depth = None;
                }
                if name == "li" && items.last().is_some_and(|i| i.depth == stack.len()) {
                    if let Some(item) = items.pop() {
                        close_item(item, nav_path, &mut items, navs.last_mut());
                    }
                }
                if name == "nav" && nav_depth == Some(stack.len()) {
                    nav_depth = None;
                    items.clear();
                    label_depth = None;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let name = xml::local_name(&e);
        match name.as_str() {
            "nav" if nav_depth.is_none() => {
                let types = xml::attr(&e, &reader, "epub:type")
                    .map(|t| t.split_ascii_whitespace().map(ToString::to_string).collect())
                    .unwrap_or_default();
                navs.push(ParsedNav {
                    types,
                    ..ParsedNav::default()
                });
                if !is_empty {
                    nav_depth = Some(stack.len());
                }
            }
            "ol" if nav_depth == Some(stack.len().wrapping_sub(1)) => {
                if let Some(parsed) = navs.last_mut() {
                    parsed.has_list = true;
                }
            }
            "li" if nav_depth.is_some() => {
                let item = PartialItem {
                    depth: stack.len(),
                    head: ItemHead::None,
                    href: None,
                    label: String::new(),
                    children: Vec::new(),
                };
                if is_empty {
                    close_item(item, nav_path, &mut items, navs.last_mut());
                } else {
                    items.push(item);
                }
            }
            "a" | "span" if label_depth.is_none() => {
                if let Some(item) = items.last_mut() {
                    if item.depth + 1 == stack.len() && item.head == ItemHead::None {
                        if name == "a" {
                            item.head = ItemHead::Anchor;
                            item.href = xml::attr(&e, &reader, "href");
                        } else {
                            item.head = ItemHead::Span;
                        }
                        if !is_empty {
                            label_depth = Some(stack.len());
                        }
                    }
                }
            }
            _ => {}
        }

        if !is_empty {
            stack.push(name);
        }
    }

    let toc_index = navs
        .iter()
        .position(|n| n.has_type("toc"))
        .or_else(|| (!navs.is_empty()).then_some(0));

    let mut nav = Navigation::new();
    if let Some(index) = toc_index {
        let parsed = &mut navs[index];
        if !parsed.has_list {
            return Err(EpubError::InvalidNavigationDocument(
                "toc nav has no ordered list".to_string(),
            ));
        }
        if let Some(error) = parsed.error.take() {
            return Err(EpubError::InvalidNavigationDocument(error));
        }
        nav.toc = core::mem::take(&mut parsed.items);
    }

    for (index, parsed) in navs.iter_mut().enumerate() {
        if Some(index) == toc_index {
            continue;
        }
        if let Some(error) = &parsed.error {
            log::warn!("[NAV] Ignoring malformed entry in nav {:?}: {}", parsed.types, error);
        }
        if parsed.has_type("landmarks") {
            nav.landmarks = core::mem::take(&mut parsed.items);
        } else if parsed.has_type("page-list") {
            nav.page_list = core::mem::take(&mut parsed.items);
        }
    }

    log::debug!(
        "[NAV] Parsed nav document '{}': {} entries, {} landmarks, {} page targets",
        nav_path,
        nav.toc_count(),
        nav.landmarks.len(),
        nav.page_list.len()
    );
    Ok(nav)
}

fn push_label_text(label_depth: Option<usize>, items: &mut [PartialItem], text: &str) {
    if label_depth.is_some() {
        if let Some(item) = items.last_mut() {
            item.label.push_str(text);
        }
    }
}

/// Finish a list item and attach it to its parent item or its `nav`.
///
/// Structural problems are recorded on the `nav` rather than returned, since
/// only the table of contents `nav` is required to be well formed.
fn close_item(
    item: PartialItem,
    nav_path: &str,
    items: &mut [PartialItem],
    parsed: Option<&mut ParsedNav>,
) {
    let Some(parsed) = parsed else {
        return;
    };
    let label = normalize_label(&item.label);
    let href = item.href.as_deref().map(str::trim).filter(|h| !h.is_empty());

    let target = match (item.head, href) {
        (ItemHead::Anchor, Some(href)) => uri::resolve_href(nav_path, href),
        (ItemHead::None, _) => {
            parsed
                .error
                .get_or_insert_with(|| "list item has neither a link nor a span".to_string());
            return;
        }
        _ => match item.children.first() {
            Some(first) => first.target.clone(),
            None => {
                parsed
                    .error
                    .get_or_insert_with(|| format!("list item '{}' has no target", label));
                return;
            }
        },
    };

    let point = NavPoint {
        label,
        target,
        children: item.children,
        play_order: None,
        page: None,
    };
    match items.last_mut() {
        Some(parent) => parent.children.push(point),
        None => parsed.items.push(point),
    }
}
