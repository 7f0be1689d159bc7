//! High-level EPUB API for common workflows.
//!
//! This module wraps the lower-level parsers for the usual
//! "open container -> inspect metadata -> read chapters in order" flow:
//!
//! ```rust,no_run
//! use quire::book::EpubBook;
//!
//! # fn main() -> Result<(), quire::error::EpubError> {
//! let book = EpubBook::open_file("book.epub")?;
//! println!("{:?} ({} chapters)", book.title(), book.chapter_count());
//! for chapter in book.reading_sequence()? {
//!     println!("{} -> {} bytes", chapter.uri, chapter.markup.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! An `EpubBook` is immutable after open apart from TOC page annotations,
//! so it can be shared behind an `Arc` (see `async_api`).

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::css;
use crate::dom::{Document, DocumentTree, NodeId};
use crate::error::EpubError;
use crate::navigation::{locate_navigation, parse_navigation, NavPoint, Navigation};
use crate::package::{
    parse_container_xml, parse_package, Package, PackageMetadata, Resource, Spine, CONTAINER_PATH,
};
use crate::uri;
use crate::xml;
use crate::zip::{Archive, ZipLimits};

/// Media type of chapter stylesheets.
const CSS_MEDIA_TYPE: &str = "text/css";

/// Validation strictness for high-level open behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ValidationMode {
    /// Best-effort behavior for partial/quirky EPUBs.
    #[default]
    Lenient,
    /// Fail on a bad `mimetype` entry and on unreadable navigation.
    Strict,
}

/// High-level configuration for opening EPUB books.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EpubBookOptions {
    /// ZIP safety limits. `None` uses [`ZipLimits::default`].
    pub zip_limits: Option<ZipLimits>,
    /// Validation strictness for open.
    pub validation_mode: ValidationMode,
}

/// Builder for opening EPUBs with explicit options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EpubBookBuilder {
    options: EpubBookOptions,
}

impl EpubBookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set explicit ZIP limits.
    pub fn with_zip_limits(mut self, limits: ZipLimits) -> Self {
        self.options.zip_limits = Some(limits);
        self
    }

    /// Enable strict validation mode.
    pub fn strict(mut self) -> Self {
        self.options.validation_mode = ValidationMode::Strict;
        self
    }

    pub fn validation_mode(mut self, mode: ValidationMode) -> Self {
        self.options.validation_mode = mode;
        self
    }

    pub fn options(&self) -> EpubBookOptions {
        self.options
    }

    /// Open an EPUB from its bytes.
    pub fn open(self, bytes: Vec<u8>) -> Result<EpubBook, EpubError> {
        EpubBook::open_with_options(bytes, self.options)
    }

    /// Open an EPUB from an arbitrary reader.
    pub fn from_reader<R: Read>(self, reader: R) -> Result<EpubBook, EpubError> {
        EpubBook::from_reader_with_options(reader, self.options)
    }

    /// Open an EPUB from a file path.
    pub fn open_file<P: AsRef<Path>>(self, path: P) -> Result<EpubBook, EpubError> {
        EpubBook::open_file_with_options(path, self.options)
    }
}

/// Chapter descriptor in spine order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterRef {
    /// Spine position index.
    pub index: usize,
    /// Manifest id of the chapter resource.
    pub id: String,
    /// Archive-absolute path.
    pub path: String,
    /// Canonical `epub://` URI.
    pub uri: String,
    /// Manifest media type.
    pub media_type: String,
    /// False for `linear="no"` spine entries.
    pub linear: bool,
}

/// A decoded chapter with rewritten links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterContent {
    pub index: usize,
    pub id: String,
    pub path: String,
    pub uri: String,
    /// Chapter XHTML with in-archive references rewritten to `epub://` URIs
    pub markup: String,
}

/// Cover image bytes and where they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverImage {
    pub id: String,
    pub path: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// A stylesheet prepared for column pagination, for the caller to install.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StylesheetRegistration {
    /// Stable key for the stylesheet (its archive path)
    pub key: String,
    pub css: String,
}

/// A parsed EPUB backed by the whole container in memory.
#[derive(Debug)]
pub struct EpubBook {
    archive: Archive,
    package: Package,
    navigation: Navigation,
}

impl EpubBook {
    /// Create a builder for opening with explicit options.
    pub fn builder() -> EpubBookBuilder {
        EpubBookBuilder::new()
    }

    /// Open an EPUB from its bytes.
    pub fn open(bytes: Vec<u8>) -> Result<Self, EpubError> {
        Self::open_with_options(bytes, EpubBookOptions::default())
    }

    pub fn open_with_options(bytes: Vec<u8>, options: EpubBookOptions) -> Result<Self, EpubError> {
        let archive = Archive::open_with_limits(bytes, options.zip_limits.unwrap_or_default())?;
        Self::from_archive(archive, options.validation_mode)
    }

    /// Open an EPUB from any `Read` source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EpubError> {
        Self::from_reader_with_options(reader, EpubBookOptions::default())
    }

    pub fn from_reader_with_options<R: Read>(
        mut reader: R,
        options: EpubBookOptions,
    ) -> Result<Self, EpubError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| EpubError::Io(e.to_string()))?;
        Self::open_with_options(bytes, options)
    }

    /// Open an EPUB from disk.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        Self::open_file_with_options(path, EpubBookOptions::default())
    }

    pub fn open_file_with_options<P: AsRef<Path>>(
        path: P,
        options: EpubBookOptions,
    ) -> Result<Self, EpubError> {
        let bytes = std::fs::read(path).map_err(|e| EpubError::Io(e.to_string()))?;
        Self::open_with_options(bytes, options)
    }

    /// Parse the package and navigation of an already indexed archive.
    pub fn from_archive(archive: Archive, mode: ValidationMode) -> Result<Self, EpubError> {
        if let Err(err) = archive.validate_mimetype() {
            if mode == ValidationMode::Strict {
                return Err(err);
            }
            log::warn!("[EPUB] {}", err);
        }

        let container = archive
            .get(CONTAINER_PATH)
            .ok_or(EpubError::MissingRootPointer)?;
        let package_path = parse_container_xml(&container)?;
        let opf = archive
            .get(&package_path)
            .ok_or_else(|| EpubError::ResourceMissing {
                path: package_path.clone(),
            })?;
        let package = parse_package(&opf, &package_path)?;
        let navigation = load_navigation(&archive, &package, mode)?;

        log::debug!(
            "[EPUB] Opened '{}': {} chapters, {} TOC entries",
            package_path,
            package.spine().len(),
            navigation.toc_count()
        );
        Ok(Self {
            archive,
            package,
            navigation,
        })
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// EPUB package metadata.
    pub fn metadata(&self) -> &PackageMetadata {
        self.package.metadata()
    }

    pub fn title(&self) -> Option<&str> {
        self.package.title()
    }

    pub fn creators(&self) -> &[String] {
        self.package.creators()
    }

    pub fn language(&self) -> Option<&str> {
        self.package.language()
    }

    /// Reading order from `<spine>`.
    pub fn spine(&self) -> &Spine {
        self.package.spine()
    }

    /// Parsed navigation; empty when the book has none.
    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    /// Top-level TOC entries.
    pub fn toc(&self) -> &[NavPoint] {
        &self.navigation.toc
    }

    /// TOC entries for page annotation.
    pub fn toc_mut(&mut self) -> &mut [NavPoint] {
        &mut self.navigation.toc
    }

    /// Number of entries in the spine reading order.
    pub fn chapter_count(&self) -> usize {
        self.package.spine().len()
    }

    /// Get a chapter descriptor by spine index.
    pub fn chapter(&self, index: usize) -> Result<ChapterRef, EpubError> {
        let out_of_bounds = EpubError::ChapterOutOfBounds {
            index,
            chapter_count: self.chapter_count(),
        };
        let item = self.package.spine().get(index).ok_or(out_of_bounds.clone())?;
        let resource = self.package.resource(&item.idref).ok_or(out_of_bounds)?;
        Ok(chapter_ref(index, item.linear, resource))
    }

    /// Enumerate chapters in spine order.
    pub fn chapters(&self) -> impl Iterator<Item = ChapterRef> + '_ {
        self.package
            .spine()
            .items()
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                self.package
                    .resource(&item.idref)
                    .map(|resource| chapter_ref(index, item.linear, resource))
            })
    }

    /// Bytes of a manifest resource by id.
    pub fn read_resource(&self, id: &str) -> Option<Vec<u8>> {
        let resource = self.package.resource(id)?;
        self.archive.get(&resource.path)
    }

    /// Bytes of an archive entry by path or `epub://` URI (fragment ignored).
    pub fn read_resource_by_path(&self, path: &str) -> Option<Vec<u8>> {
        let (path, _) = uri::split_fragment(uri::strip_scheme(path));
        self.archive.get(path)
    }

    /// UTF-8 text of a manifest resource by id.
    pub fn resource_text(&self, id: &str) -> Option<String> {
        let resource = self.package.resource(id)?;
        self.archive.get_text(&resource.path)
    }

    /// Cover image, when the package declares one and it is present.
    pub fn cover(&self) -> Option<CoverImage> {
        let resource = self.package.cover_resource()?;
        let data = self.archive.get(&resource.path)?;
        Some(CoverImage {
            id: resource.id.clone(),
            path: resource.path.clone(),
            media_type: resource.media_type.clone(),
            data,
        })
    }

    /// `<unique identifier>@<dcterms:modified>`, when both are known.
    pub fn release_identifier(&self) -> Option<String> {
        self.package.release_identifier()
    }

    /// Chapter XHTML with in-archive links rewritten to `epub://` URIs.
    ///
    /// `href`/`src` on `a`, `link`, `img` and `image` (including
    /// `xlink:href`) are resolved against the chapter path. External links
    /// are left untouched. `preserveAspectRatio` is removed from `svg`
    /// elements so cover images scale with the column.
    pub fn chapter_markup(&self, index: usize) -> Result<String, EpubError> {
        let chapter = self.chapter(index)?;
        let bytes = self
            .archive
            .get(&chapter.path)
            .ok_or_else(|| EpubError::ResourceMissing {
                path: chapter.path.clone(),
            })?;
        let text = String::from_utf8(bytes).map_err(|_| EpubError::ChapterNotUtf8 {
            path: chapter.path.clone(),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        rewrite_links(text, &chapter.path)
    }

    /// Every spine chapter, decoded and rewritten, in reading order.
    pub fn reading_sequence(&self) -> Result<Vec<ChapterContent>, EpubError> {
        (0..self.chapter_count())
            .map(|index| self.chapter_content(index))
            .collect()
    }

    /// One chapter of [`reading_sequence`](Self::reading_sequence).
    pub fn chapter_content(&self, index: usize) -> Result<ChapterContent, EpubError> {
        let chapter = self.chapter(index)?;
        let markup = self.chapter_markup(index)?;
        Ok(ChapterContent {
            index,
            id: chapter.id,
            path: chapter.path,
            uri: chapter.uri,
            markup,
        })
    }

    /// Every `text/css` resource scoped to the content root, with
    /// column-pagination fix-ups applied.
    ///
    /// Installing them is left to the caller; nothing global is touched.
    pub fn stylesheets(&self) -> Vec<StylesheetRegistration> {
        self.package
            .resources()
            .iter()
            .filter(|r| r.media_type == CSS_MEDIA_TYPE)
            .filter_map(|r| match self.archive.get_text(&r.path) {
                Some(text) => Some(StylesheetRegistration {
                    key: r.path.clone(),
                    css: paginate_css(&css::scope_stylesheet(&text)),
                }),
                None => {
                    log::warn!("[EPUB] Skipping unreadable stylesheet '{}'", r.path);
                    None
                }
            })
            .collect()
    }

    /// All chapters stitched into one document (see [`Document::assemble`]).
    ///
    /// Chapter wrappers are keyed by archive path, so TOC targets resolve
    /// with [`resolve_target`].
    pub fn content_document(&self) -> Result<Document, EpubError> {
        let mut parsed = Vec::with_capacity(self.chapter_count());
        for chapter in self.reading_sequence()? {
            let doc = Document::parse(chapter.markup.as_bytes())?;
            parsed.push((chapter.path, doc));
        }
        Ok(Document::assemble(
            parsed.iter().map(|(path, doc)| (path.as_str(), doc)),
        ))
    }

    /// A cursor over this book's chapters, starting at the first.
    pub fn cursor(&self) -> ReadingCursor {
        ReadingCursor::new(self.chapter_count())
    }
}

fn chapter_ref(index: usize, linear: bool, resource: &Resource) -> ChapterRef {
    ChapterRef {
        index,
        id: resource.id.clone(),
        path: resource.path.clone(),
        uri: resource.uri(),
        media_type: resource.media_type.clone(),
        linear,
    }
}

/// Parse the first navigation candidate, if any.
///
/// A book without navigation has an empty TOC. Unreadable or malformed
/// navigation is an error only in strict mode.
fn load_navigation(
    archive: &Archive,
    package: &Package,
    mode: ValidationMode,
) -> Result<Navigation, EpubError> {
    let Some((resource, dialect)) = locate_navigation(package) else {
        log::debug!("[NAV] No navigation resource declared");
        return Ok(Navigation::new());
    };

    let parsed = match archive.get(&resource.path) {
        Some(bytes) => parse_navigation(&bytes, dialect, &resource.path),
        None => Err(EpubError::ResourceMissing {
            path: resource.path.clone(),
        }),
    };

    match parsed {
        Ok(nav) => Ok(nav),
        Err(err) if mode == ValidationMode::Strict => Err(err),
        Err(err) => {
            log::warn!(
                "[NAV] Failed to load navigation document '{}': {}",
                resource.path,
                err
            );
            Ok(Navigation::new())
        }
    }
}

/// True for elements whose start tags may be rewritten.
fn is_linking_element(local_name: &str) -> bool {
    matches!(local_name, "a" | "link" | "img" | "image" | "svg")
}

/// Copy `markup` verbatim except for the start tags of linking elements,
/// whose `href`/`src` values are resolved against `chapter_path`, and of
/// `svg` elements, which lose `preserveAspectRatio`.
fn rewrite_links(markup: &str, chapter_path: &str) -> Result<String, EpubError> {
    let mut reader = xml::lenient_reader(markup.as_bytes());
    let mut out = String::with_capacity(markup.len() + markup.len() / 8);
    let mut copied = 0;

    loop {
        let (e, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::Eof => break,
            _ => continue,
        };
        if !is_linking_element(&xml::local_name(&e)) {
            continue;
        }
        let Some(rebuilt) = rebuild_tag(&e, &reader, chapter_path, is_empty) else {
            continue;
        };
        let tag_end = reader.buffer_position() as usize;
        let Some(tag_start) = markup[copied..tag_end].rfind('<').map(|i| copied + i) else {
            continue;
        };
        out.push_str(&markup[copied..tag_start]);
        out.push_str(&rebuilt);
        copied = tag_end;
    }

    out.push_str(&markup[copied..]);
    Ok(out)
}

/// Serialize a start tag with resolved references, or `None` when it has
/// nothing to rewrite.
fn rebuild_tag(
    e: &BytesStart<'_>,
    reader: &quick_xml::reader::Reader<&[u8]>,
    chapter_path: &str,
    is_empty: bool,
) -> Option<String> {
    let attrs = xml::attrs(e, reader);
    let is_reference = |key: &str| {
        let local = key.rsplit_once(':').map(|(_, l)| l).unwrap_or(key);
        local == "href" || local == "src"
    };
    let is_svg = xml::local_name(e) == "svg";
    let is_dropped = |key: &str| is_svg && key == "preserveAspectRatio";
    let rewrites = attrs
        .iter()
        .any(|(k, v)| (is_reference(k) && !v.trim().is_empty()) || is_dropped(k));
    if !rewrites {
        return None;
    }

    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut tag = format!("<{}", name);
    for (key, value) in attrs.iter().filter(|(k, _)| !is_dropped(k)) {
        let value = if is_reference(key) && !value.trim().is_empty() {
            uri::resolve_href(chapter_path, value)
        } else {
            value.clone()
        };
        tag.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
    }
    tag.push_str(if is_empty { "/>" } else { ">" });
    Some(tag)
}

fn css_fixups() -> &'static [(Regex, &'static str)] {
    static FIXUPS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    FIXUPS.get_or_init(|| {
        [
            (r"font-size: *0;", ""),
            (r"page-break-(inside|after|before): *always;", "break-$1: column;"),
            (r"overflow: *hidden;", ""),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(re) => Some((re, replacement)),
            Err(err) => {
                log::warn!("[EPUB] Bad stylesheet fix-up {:?}: {}", pattern, err);
                None
            }
        })
        .collect()
    })
}

/// Rewrite declarations that fight column pagination.
///
/// Forced page breaks become column breaks; zero font sizes and hidden
/// overflow are dropped.
pub fn paginate_css(css: &str) -> String {
    let mut out = css.to_string();
    for (re, replacement) in css_fixups() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// Node of an assembled document that a TOC target points at.
///
/// The fragment wins when it names an element inside the target chapter;
/// otherwise the chapter wrapper itself is returned.
pub fn resolve_target(doc: &Document, target: &str) -> Option<NodeId> {
    let (path, fragment) = uri::split_fragment(uri::strip_scheme(target));
    let chapter = doc.element_by_id(path);
    let Some(fragment) = fragment else {
        return chapter;
    };
    let Some(chapter) = chapter else {
        return doc.element_by_id(fragment);
    };
    doc.descendants(chapter)
        .into_iter()
        .find(|n| doc.id_attr(*n) == Some(fragment))
        .or(Some(chapter))
}

/// Current chapter position, detached from the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadingCursor {
    chapter_count: usize,
    current: usize,
}

impl ReadingCursor {
    pub fn new(chapter_count: usize) -> Self {
        Self {
            chapter_count,
            current: 0,
        }
    }

    /// Current chapter index. Meaningless when the book has no chapters.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn chapter_count(&self) -> usize {
        self.chapter_count
    }

    /// Advance one chapter; `None` (and no move) at the last chapter.
    pub fn next(&mut self) -> Option<usize> {
        if self.current + 1 >= self.chapter_count {
            return None;
        }
        self.current += 1;
        Some(self.current)
    }

    /// Go back one chapter; `None` (and no move) at the first chapter.
    pub fn prev(&mut self) -> Option<usize> {
        if self.current == 0 || self.chapter_count == 0 {
            return None;
        }
        self.current -= 1;
        Some(self.current)
    }

    /// Jump to `index`.
    pub fn seek(&mut self, index: usize) -> Result<usize, EpubError> {
        if index >= self.chapter_count {
            return Err(EpubError::ChapterOutOfBounds {
                index,
                chapter_count: self.chapter_count,
            });
        }
        self.current = index;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::tests::{build_zip, TestEntry};

    const CONTAINER: &[u8] = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF: &[u8] = br#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title>Test Book</dc:title>
    <dc:creator>Ada</dc:creator>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="Text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="Text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="Styles/main.css" media-type="text/css"/>
    <item id="img" href="Images/cover.png" media-type="image/png" properties="cover-image"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2" linear="no"/>
  </spine>
</package>"#;

    const NAV: &[u8] = br#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body><nav epub:type="toc"><ol>
  <li><a href="Text/ch1.xhtml">One</a></li>
  <li><a href="Text/ch2.xhtml#later">Two</a></li>
</ol></nav></body></html>"#;

    const CH1: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:xlink="http://www.w3.org/1999/xlink">
<head><link rel="stylesheet" href="../Styles/main.css"/></head>
<body>
<p>See <a href="ch2.xhtml#later">later</a> or <a href="https://example.com">the web</a>.</p>
<img src="../Images/cover.png" alt="cover &amp; more"/>
<svg viewBox="0 0 10 10" preserveAspectRatio="none"><image xlink:href="../Images/cover.png"/></svg>
</body>
</html>"#;

    const CH2: &[u8] = br#"<html><body class="back"><h1>Two</h1><p id="later">Later text</p></body></html>"#;

    const CSS: &[u8] = b"h1 { page-break-before: always; font-size: 0; }\np { overflow: hidden; color: red; }";

    fn book_bytes(nav: &'static [u8], mimetype: &'static [u8]) -> Vec<u8> {
        build_zip(&[
            TestEntry::stored("mimetype", mimetype),
            TestEntry::deflated("META-INF/container.xml", CONTAINER),
            TestEntry::deflated("OEBPS/content.opf", OPF),
            TestEntry::deflated("OEBPS/nav.xhtml", nav),
            TestEntry::deflated("OEBPS/Text/ch1.xhtml", CH1),
            TestEntry::deflated("OEBPS/Text/ch2.xhtml", CH2),
            TestEntry::stored("OEBPS/Styles/main.css", CSS),
            TestEntry::stored("OEBPS/Images/cover.png", b"\x89PNG fake"),
        ])
    }

    fn book() -> EpubBook {
        EpubBook::open(book_bytes(NAV, b"application/epub+zip")).unwrap()
    }

    #[test]
    fn test_open_exposes_package_and_navigation() {
        let book = book();
        assert_eq!(book.title(), Some("Test Book"));
        assert_eq!(book.creators(), ["Ada".to_string()]);
        assert_eq!(book.chapter_count(), 2);
        assert_eq!(book.toc().len(), 2);
        assert_eq!(book.toc()[1].target, "epub://OEBPS/Text/ch2.xhtml#later");
        assert_eq!(
            book.release_identifier().as_deref(),
            Some("urn:uuid:1234@2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_chapters_in_spine_order() {
        let book = book();
        let chapters: Vec<ChapterRef> = book.chapters().collect();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].path, "OEBPS/Text/ch1.xhtml");
        assert_eq!(chapters[0].uri, "epub://OEBPS/Text/ch1.xhtml");
        assert!(chapters[0].linear);
        assert!(!chapters[1].linear);
        assert!(matches!(
            book.chapter(5),
            Err(EpubError::ChapterOutOfBounds {
                index: 5,
                chapter_count: 2
            })
        ));
    }

    #[test]
    fn test_resource_access() {
        let book = book();
        assert_eq!(book.read_resource("css").unwrap(), CSS);
        assert!(book.read_resource("missing").is_none());
        assert_eq!(
            book.read_resource_by_path("epub://OEBPS/Text/ch2.xhtml#later").unwrap(),
            CH2
        );
        assert!(book.resource_text("c2").unwrap().contains("Later text"));
        let cover = book.cover().unwrap();
        assert_eq!(cover.path, "OEBPS/Images/cover.png");
        assert_eq!(cover.media_type, "image/png");
        assert!(cover.data.starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_chapter_markup_rewrites_links() {
        let book = book();
        let markup = book.chapter_markup(0).unwrap();
        assert!(markup.contains(r#"href="epub://OEBPS/Styles/main.css""#));
        assert!(markup.contains(r#"<a href="epub://OEBPS/Text/ch2.xhtml#later">"#));
        assert!(markup.contains(r#"<a href="https://example.com">"#));
        assert!(markup.contains(r#"src="epub://OEBPS/Images/cover.png""#));
        assert!(markup.contains(r#"alt="cover &amp; more""#));
        assert!(markup.contains(r#"<image xlink:href="epub://OEBPS/Images/cover.png"/>"#));
        assert!(markup.contains(r#"<svg viewBox="0 0 10 10"><image"#));
        assert!(!markup.contains("preserveAspectRatio"));
        // Untouched parts are copied verbatim
        assert!(markup.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(markup.contains("<p>See "));
    }

    #[test]
    fn test_svg_aspect_ratio_is_dropped_without_links() {
        let markup = r#"<div><svg xmlns="http://www.w3.org/2000/svg" preserveAspectRatio="xMidYMid meet" height="100%"/><p preserveAspectRatio="x">kept</p></div>"#;
        let out = rewrite_links(markup, "OEBPS/Text/ch1.xhtml").unwrap();
        assert_eq!(
            out,
            r#"<div><svg xmlns="http://www.w3.org/2000/svg" height="100%"/><p preserveAspectRatio="x">kept</p></div>"#
        );
    }

    #[test]
    fn test_reading_sequence_and_content_document() {
        let book = book();
        let sequence = book.reading_sequence().unwrap();
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence[1].id, "c2");
        assert_eq!(sequence[1].index, 1);

        let doc = book.content_document().unwrap();
        let wrapper = doc.element_by_id("OEBPS/Text/ch2.xhtml").unwrap();
        assert!(doc.has_class(wrapper, "back"));
        let later = resolve_target(&doc, &book.toc()[1].target).unwrap();
        assert_eq!(doc.id_attr(later), Some("later"));
        assert_eq!(
            resolve_target(&doc, &book.toc()[0].target),
            doc.element_by_id("OEBPS/Text/ch1.xhtml")
        );
        assert!(doc.element_by_id(crate::dom::START_MARKER_ID).is_some());
    }

    #[test]
    fn test_target_fragment_is_scoped_to_its_chapter() {
        let c1 = Document::parse(br#"<html><body><p id="sec">one</p></body></html>"#).unwrap();
        let c2 = Document::parse(
            br#"<html><body><p>filler</p><p id="sec">two</p></body></html>"#,
        )
        .unwrap();
        let doc = Document::assemble([("c1.xhtml", &c1), ("c2.xhtml", &c2)]);

        let second = resolve_target(&doc, "epub://c2.xhtml#sec").unwrap();
        assert_eq!(doc.tag_name(second), Some("p"));
        assert_eq!(doc.text_content(second), "two");
        let first = resolve_target(&doc, "epub://c1.xhtml#sec").unwrap();
        assert_eq!(doc.text_content(first), "one");
        assert_eq!(
            resolve_target(&doc, "epub://c2.xhtml#gone"),
            doc.element_by_id("c2.xhtml")
        );
        assert_eq!(
            resolve_target(&doc, "epub://missing.xhtml#sec"),
            Some(first)
        );
    }

    #[test]
    fn test_stylesheets_are_fixed_up() {
        let sheets = book().stylesheets();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].key, "OEBPS/Styles/main.css");
        assert_eq!(
            sheets[0].css,
            ".text-epub h1 { break-before: column;  }\n.text-epub p {  color: red; }"
        );
    }

    #[test]
    fn test_paginate_css_keeps_unrelated_declarations() {
        assert_eq!(paginate_css("p { font-size: 0.9em; }"), "p { font-size: 0.9em; }");
        assert_eq!(
            paginate_css("div { page-break-inside:always; }"),
            "div { break-inside: column; }"
        );
    }

    #[test]
    fn test_bad_mimetype_is_fatal_only_when_strict() {
        let bytes = book_bytes(NAV, b"application/zip");
        assert!(EpubBook::open(bytes.clone()).is_ok());
        let strict = EpubBook::builder().strict().open(bytes);
        assert!(matches!(strict, Err(EpubError::InvalidMimetype(_))));
    }

    #[test]
    fn test_broken_navigation_is_fatal_only_when_strict() {
        let broken: &'static [u8] = br#"<html><body><nav epub:type="toc"><p>no list</p></nav></body></html>"#;
        let bytes = book_bytes(broken, b"application/epub+zip");
        let lenient = EpubBook::open(bytes.clone()).unwrap();
        assert!(lenient.toc().is_empty());
        let strict = EpubBook::builder().strict().open(bytes);
        assert!(matches!(
            strict,
            Err(EpubError::InvalidNavigationDocument(_))
        ));
    }

    #[test]
    fn test_reading_cursor() {
        let mut cursor = book().cursor();
        assert_eq!(cursor.current(), 0);
        assert_eq!(cursor.prev(), None);
        assert_eq!(cursor.next(), Some(1));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.current(), 1);
        assert_eq!(cursor.prev(), Some(0));
        assert!(cursor.seek(2).is_err());
        assert_eq!(cursor.seek(1).unwrap(), 1);

        let mut empty = ReadingCursor::new(0);
        assert_eq!(empty.next(), None);
        assert_eq!(empty.prev(), None);
    }

    #[test]
    fn test_book_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EpubBook>();
    }
}
