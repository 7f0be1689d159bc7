//! Package document (OPF) parser
//!
//! Reads `META-INF/container.xml` to find the package document, then parses
//! the package into a resource table, a reading-order spine, a multi-valued
//! metadata map and the EPUB 2 guide. All hrefs are resolved against the
//! package's own directory, never against the container root.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::EpubError;
use crate::uri;
use crate::xml;

/// Fixed path of the container's root pointer document.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// A manifest resource with its archive-absolute path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    /// Manifest id
    pub id: String,
    /// Archive-absolute path
    pub path: String,
    /// MIME type as declared in the manifest
    pub media_type: String,
    /// Space-separated `properties` (e.g. "nav", "cover-image")
    pub properties: Option<String>,
}

impl Resource {
    /// True when `properties` contains `property` as a whole token.
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|t| t == property))
    }

    /// Canonical `epub://` URI of this resource.
    pub fn uri(&self) -> String {
        uri::build_uri(&self.path, None)
    }
}

/// A single item in the spine (chapter reference)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpineItem {
    /// Manifest item this spine entry references
    pub idref: String,
    /// Optional spine-level ID
    pub id: Option<String>,
    /// Whether this item is part of the linear reading order
    pub linear: bool,
    /// Optional properties (e.g. "page-spread-left")
    pub properties: Option<String>,
}

/// Reading order of the publication.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Spine {
    items: Vec<SpineItem>,
    toc_id: Option<String>,
}

impl Spine {
    /// Ordered spine entries
    pub fn items(&self) -> &[SpineItem] {
        &self.items
    }

    /// Manifest id named by `spine@toc` (legacy navigation reference)
    pub fn toc_id(&self) -> Option<&str> {
        self.toc_id.as_deref()
    }

    /// Number of spine entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the spine has no entries
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get spine entry at `index`
    pub fn get(&self, index: usize) -> Option<&SpineItem> {
        self.items.get(index)
    }

    /// Position of the first entry referencing manifest id `idref`
    pub fn position_of(&self, idref: &str) -> Option<usize> {
        self.items.iter().position(|item| item.idref == idref)
    }
}

/// Multi-valued metadata map plus the package-level identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    values: BTreeMap<String, Vec<String>>,
    /// Text of the identifier element named by `package@unique-identifier`
    pub unique_identifier: Option<String>,
    /// Manifest id of the cover image
    pub cover_id: Option<String>,
}

impl PackageMetadata {
    /// Append `value` under `name`, keeping earlier values.
    pub fn insert(&mut self, name: &str, value: String) {
        self.values.entry(name.to_string()).or_default().push(value);
    }

    /// All values recorded under `name`, in document order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Iterate `(name, values)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// True when no metadata was recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A reference from the EPUB 2 `<guide>` element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuideRef {
    /// Reference type (e.g. "cover", "toc", "text")
    pub guide_type: String,
    /// Display title
    pub title: Option<String>,
    /// Archive-absolute path of the target
    pub path: String,
    /// Fragment of the original href, if any
    pub fragment: Option<String>,
}

/// Parsed package document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Package {
    path: String,
    resources: Vec<Resource>,
    by_id: BTreeMap<String, usize>,
    spine: Spine,
    metadata: PackageMetadata,
    guide: Vec<GuideRef>,
}

impl Package {
    /// Archive path of the package document
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directory all package hrefs are resolved against
    pub fn base_dir(&self) -> &str {
        uri::parent_dir(&self.path)
    }

    /// Manifest resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Resource by manifest id
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.by_id.get(id).and_then(|&i| self.resources.get(i))
    }

    /// Resource by archive path or `epub://` URI (fragment ignored)
    pub fn resource_by_path(&self, path: &str) -> Option<&Resource> {
        let (path, _) = uri::split_fragment(uri::strip_scheme(path));
        let path = path.strip_prefix('/').unwrap_or(path);
        self.resources.iter().find(|r| r.path == path)
    }

    /// Reading order
    pub fn spine(&self) -> &Spine {
        &self.spine
    }

    /// Metadata map
    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Guide references with resolved paths
    pub fn guide(&self) -> &[GuideRef] {
        &self.guide
    }

    /// Resource of the spine entry at `index`
    pub fn spine_resource(&self, index: usize) -> Option<&Resource> {
        self.spine
            .get(index)
            .and_then(|item| self.resource(&item.idref))
    }

    /// Spine index of the chapter stored at `path`
    pub fn chapter_index_for_path(&self, path: &str) -> Option<usize> {
        let resource = self.resource_by_path(path)?;
        self.chapter_index_for_id(&resource.id)
    }

    /// Spine index of the chapter with manifest id `id`
    pub fn chapter_index_for_id(&self, id: &str) -> Option<usize> {
        self.spine.position_of(id)
    }

    /// Cover image resource, when one is declared
    pub fn cover_resource(&self) -> Option<&Resource> {
        self.metadata
            .cover_id
            .as_deref()
            .and_then(|id| self.resource(id))
    }

    /// First value recorded under metadata `name`
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata.get(name)
    }

    /// Book title
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title")
    }

    /// All creators in document order
    pub fn creators(&self) -> &[String] {
        self.metadata.get_all("creator")
    }

    /// Primary language
    pub fn language(&self) -> Option<&str> {
        self.metadata.get("language")
    }

    /// `<unique identifier>@<dcterms:modified>`, when both are known.
    pub fn release_identifier(&self) -> Option<String> {
        let uid = self.metadata.unique_identifier.as_deref()?;
        let modified = self.metadata.get("dcterms:modified")?;
        Some(format!("{}@{}", uid, modified))
    }
}

/// Parse container.xml to find the package document path
///
/// Returns the `full-path` of the first `rootfile` that has one.
pub fn parse_container_xml(content: &[u8]) -> Result<String, EpubError> {
    let mut reader = xml::lenient_reader(content);

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if xml::local_name(&e) == "rootfile" {
                    if let Some(path) = xml::attr(&e, &reader, "full-path") {
                        let path = path.trim();
                        if !path.is_empty() {
                            return Ok(uri::normalize_path(path));
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(EpubError::MissingRootPointer)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Metadata,
    Manifest,
    Spine,
    Guide,
}

/// A direct child of `<metadata>` whose text is still being collected.
struct PendingMeta {
    key: String,
    id: Option<String>,
    depth: usize,
    text: String,
}

/// Spine itemref as written, checked against the manifest after parsing.
struct RawItemRef {
    idref: Option<String>,
    id: Option<String>,
    linear: bool,
    properties: Option<String>,
}

/// Parse a package document located at `package_path`.
///
/// Fails when the manifest or spine is missing, a manifest item lacks a
/// required attribute, or a spine entry names an unknown manifest id.
pub fn parse_package(content: &[u8], package_path: &str) -> Result<Package, EpubError> {
    let base_dir = uri::parent_dir(package_path);
    let mut reader = xml::lenient_reader(content);

    let mut resources: Vec<Resource> = Vec::new();
    let mut by_id: BTreeMap<String, usize> = BTreeMap::new();
    let mut itemrefs: Vec<RawItemRef> = Vec::new();
    let mut toc_id: Option<String> = None;
    let mut metadata = PackageMetadata::default();
    let mut guide: Vec<GuideRef> = Vec::new();

    let mut unique_identifier_id: Option<String> = None;
    let mut cover_from_properties: Option<String> = None;
    let mut cover_from_meta: Option<String> = None;
    let mut seen_manifest = false;
    let mut seen_spine = false;

    let mut depth = 0usize;
    let mut section: Option<(Section, usize)> = None;
    let mut pending: Option<PendingMeta> = None;

    loop {
        let (e, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::Text(e) => {
                if let Some(meta) = pending.as_mut() {
                    meta.text.push_str(&xml::text(&e)?);
                }
                continue;
            }
            Event::CData(e) => {
                if let Some(meta) = pending.as_mut() {
                    meta.text.push_str(&String::from_utf8_lossy(&e));
                }
                continue;
            }
            Event::GeneralRef(e) => {
                if let Some(meta) = pending.as_mut() {
                    meta.text.push_str(&xml::general_ref(&e));
                }
                continue;
            }
            Event::End(_) => {
                if pending.as_ref().is_some_and(|m| m.depth == depth) {
                    if let Some(meta) = pending.take() {
                        finish_meta(meta, &mut metadata, unique_identifier_id.as_deref());
                    }
                }
                if section.is_some_and(|(_, d)| d == depth) {
                    section = None;
                }
                depth = depth.saturating_sub(1);
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let name = xml::local_name(&e);
        match (section, name.as_str()) {
            (None, "package") => {
                unique_identifier_id = xml::attr(&e, &reader, "unique-identifier");
            }
            (None, "metadata") => section = Some((Section::Metadata, depth + 1)),
            (None, "manifest") => {
                seen_manifest = true;
                section = Some((Section::Manifest, depth + 1));
            }
            (None, "spine") => {
                seen_spine = true;
                toc_id = xml::attr(&e, &reader, "toc").filter(|t| !t.is_empty());
                section = Some((Section::Spine, depth + 1));
            }
            (None, "guide") => section = Some((Section::Guide, depth + 1)),
            (Some((Section::Manifest, _)), "item") => {
                let resource = parse_manifest_item(&e, &reader, base_dir)?;
                if cover_from_properties.is_none() && resource.has_property("cover-image") {
                    cover_from_properties = Some(resource.id.clone());
                }
                match by_id.get(&resource.id) {
                    Some(&existing) => {
                        log::warn!("[OPF] Duplicate manifest id '{}'", resource.id);
                        resources[existing] = resource;
                    }
                    None => {
                        by_id.insert(resource.id.clone(), resources.len());
                        resources.push(resource);
                    }
                }
            }
            (Some((Section::Spine, _)), "itemref") => {
                itemrefs.push(RawItemRef {
                    idref: xml::attr(&e, &reader, "idref"),
                    id: xml::attr(&e, &reader, "id"),
                    linear: xml::attr(&e, &reader, "linear").as_deref() != Some("no"),
                    properties: xml::attr(&e, &reader, "properties"),
                });
            }
            (Some((Section::Guide, _)), "reference") => {
                if let Some(reference) = parse_guide_reference(&e, &reader, base_dir) {
                    guide.push(reference);
                }
            }
            (Some((Section::Metadata, section_depth)), _) if depth == section_depth => {
                let meta = start_meta(
                    &e,
                    &reader,
                    &name,
                    depth + 1,
                    &mut metadata,
                    &mut cover_from_meta,
                );
                if let Some(meta) = meta {
                    if is_empty {
                        finish_meta(meta, &mut metadata, unique_identifier_id.as_deref());
                    } else {
                        pending = Some(meta);
                    }
                }
            }
            _ => {}
        }

        if is_empty {
            if section.is_some_and(|(_, d)| d == depth + 1) {
                section = None;
            }
        } else {
            depth += 1;
        }
    }

    if !seen_manifest {
        return Err(EpubError::MissingManifest);
    }
    if !seen_spine {
        return Err(EpubError::MissingSpine);
    }

    let mut items = Vec::with_capacity(itemrefs.len());
    for raw in itemrefs {
        let idref = raw.idref.unwrap_or_default();
        if !by_id.contains_key(&idref) {
            return Err(EpubError::DanglingSpineRef { idref });
        }
        items.push(SpineItem {
            idref,
            id: raw.id,
            linear: raw.linear,
            properties: raw.properties,
        });
    }

    metadata.cover_id = cover_from_meta.or(cover_from_properties);

    log::debug!(
        "[OPF] Parsed '{}': {} resources, {} spine items, {} guide refs",
        package_path,
        resources.len(),
        items.len(),
        guide.len()
    );

    Ok(Package {
        path: package_path.to_string(),
        resources,
        by_id,
        spine: Spine { items, toc_id },
        metadata,
        guide,
    })
}

/// Handle the start of a direct `<metadata>` child.
///
/// `meta name=… content=…` is recorded immediately; anything that carries
/// its value as text is returned for collection.
fn start_meta(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    name: &str,
    depth: usize,
    metadata: &mut PackageMetadata,
    cover_from_meta: &mut Option<String>,
) -> Option<PendingMeta> {
    if name != "meta" {
        return Some(PendingMeta {
            key: name.to_string(),
            id: xml::attr(e, reader, "id"),
            depth,
            text: String::new(),
        });
    }

    let meta_name = xml::attr(e, reader, "name");
    let content = xml::attr(e, reader, "content");
    if let (Some(meta_name), Some(content)) = (meta_name, content) {
        if meta_name == "cover" {
            *cover_from_meta = Some(content.clone());
        }
        metadata.insert(&meta_name, content);
        return None;
    }

    xml::attr(e, reader, "property").map(|property| PendingMeta {
        key: property,
        id: None,
        depth,
        text: String::new(),
    })
}

fn finish_meta(meta: PendingMeta, metadata: &mut PackageMetadata, unique_id: Option<&str>) {
    let text = meta.text.trim().to_string();
    if meta.key == "identifier"
        && metadata.unique_identifier.is_none()
        && unique_id.is_some()
        && meta.id.as_deref() == unique_id
    {
        metadata.unique_identifier = Some(text.clone());
    }
    metadata.insert(&meta.key, text);
}

/// Parse a manifest item, requiring `id`, `href` and `media-type`.
fn parse_manifest_item(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    base_dir: &str,
) -> Result<Resource, EpubError> {
    let id = xml::attr(e, reader, "id");
    let Some(href) = xml::attr(e, reader, "href") else {
        return Err(EpubError::MalformedManifestItem {
            attribute: "href",
            id,
        });
    };
    let Some(media_type) = xml::attr(e, reader, "media-type") else {
        return Err(EpubError::MalformedManifestItem {
            attribute: "media-type",
            id,
        });
    };
    let Some(id) = id else {
        return Err(EpubError::MalformedManifestItem {
            attribute: "id",
            id: None,
        });
    };

    let (href_path, _) = uri::split_fragment(href.trim());
    Ok(Resource {
        id,
        path: uri::join_path(base_dir, href_path),
        media_type: media_type.trim().to_string(),
        properties: xml::attr(e, reader, "properties"),
    })
}

/// Parse a guide reference; incomplete references are skipped.
fn parse_guide_reference(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    base_dir: &str,
) -> Option<GuideRef> {
    let guide_type = xml::attr(e, reader, "type")?;
    let href = xml::attr(e, reader, "href")?;
    let (path, fragment) = uri::split_fragment(href.trim());
    Some(GuideRef {
        guide_type,
        title: xml::attr(e, reader, "title"),
        path: uri::join_path(base_dir, path),
        fragment: fragment.map(ToString::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test Book</dc:title>
    <dc:creator>First Author</dc:creator>
    <dc:creator>Second Author</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="isbn">urn:isbn:978-3-16-148410-0</dc:identifier>
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <meta property="dcterms:modified">2024-01-15T10:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="c1" href="Text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="Text/ch%202.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="../Images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
    <itemref idref="c2" linear="no"/>
  </spine>
  <guide>
    <reference type="text" title="Start" href="Text/ch1.xhtml#start"/>
    <reference type="cover"/>
  </guide>
</package>"#;

    fn minimal() -> Package {
        parse_package(MINIMAL_OPF.as_bytes(), "OEBPS/content.opf").unwrap()
    }

    #[test]
    fn test_parse_container_xml() {
        let container = br#"<?xml version="1.0"?>
<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container" version="1.0">
   <rootfiles>
      <rootfile full-path="EPUB/package.opf" media-type="application/oebps-package+xml"/>
   </rootfiles>
</container>"#;
        assert_eq!(parse_container_xml(container).unwrap(), "EPUB/package.opf");
    }

    #[test]
    fn test_container_without_full_path_is_missing_root_pointer() {
        let container = br#"<container><rootfiles><rootfile media-type="x"/></rootfiles></container>"#;
        assert_eq!(
            parse_container_xml(container),
            Err(EpubError::MissingRootPointer)
        );
        assert_eq!(
            parse_container_xml(b"<container/>"),
            Err(EpubError::MissingRootPointer)
        );
    }

    #[test]
    fn test_resources_resolve_against_package_directory() {
        let package = minimal();
        assert_eq!(package.base_dir(), "OEBPS");
        assert_eq!(package.resource("c1").unwrap().path, "OEBPS/Text/ch1.xhtml");
        assert_eq!(package.resource("c2").unwrap().path, "OEBPS/Text/ch 2.xhtml");
        assert_eq!(package.resource("img").unwrap().path, "Images/cover.jpg");
        assert_eq!(package.resources().len(), 3);
    }

    #[test]
    fn test_spine_order_linear_flag_and_toc_id() {
        let package = minimal();
        let spine = package.spine();
        assert_eq!(spine.len(), 2);
        assert_eq!(spine.get(0).unwrap().idref, "c1");
        assert!(spine.get(0).unwrap().linear);
        assert!(!spine.get(1).unwrap().linear);
        assert_eq!(spine.toc_id(), Some("ncx"));
    }

    #[test]
    fn test_metadata_is_multi_valued() {
        let package = minimal();
        assert_eq!(package.title(), Some("Test Book"));
        assert_eq!(package.creators(), ["First Author", "Second Author"]);
        assert_eq!(package.language(), Some("en"));
        assert_eq!(package.metadata().get_all("identifier").len(), 2);
        assert_eq!(
            package.metadata_value("dcterms:modified"),
            Some("2024-01-15T10:00:00Z")
        );
    }

    #[test]
    fn test_unique_identifier_and_release_identifier() {
        let package = minimal();
        assert_eq!(
            package.metadata().unique_identifier.as_deref(),
            Some("urn:uuid:1234")
        );
        assert_eq!(
            package.release_identifier().as_deref(),
            Some("urn:uuid:1234@2024-01-15T10:00:00Z")
        );
    }

    #[test]
    fn test_unique_identifier_unset_without_match() {
        let opf = br#"<package unique-identifier="nope"><metadata>
            <identifier id="other">x</identifier></metadata>
            <manifest/><spine/></package>"#;
        let package = parse_package(opf, "content.opf").unwrap();
        assert_eq!(package.metadata().unique_identifier, None);
        assert_eq!(package.release_identifier(), None);
    }

    #[test]
    fn test_cover_from_properties() {
        let package = minimal();
        assert_eq!(package.metadata().cover_id.as_deref(), Some("img"));
        assert_eq!(package.cover_resource().unwrap().path, "Images/cover.jpg");
    }

    #[test]
    fn test_meta_cover_overrides_properties() {
        let opf = br#"<package><metadata><meta name="cover" content="c2"/></metadata>
            <manifest>
              <item id="c1" href="a.jpg" media-type="image/jpeg" properties="cover-image"/>
              <item id="c2" href="b.jpg" media-type="image/jpeg"/>
            </manifest><spine/></package>"#;
        let package = parse_package(opf, "content.opf").unwrap();
        assert_eq!(package.metadata().cover_id.as_deref(), Some("c2"));
        assert_eq!(package.metadata_value("cover"), Some("c2"));
    }

    #[test]
    fn test_guide_references_resolved() {
        let package = minimal();
        assert_eq!(package.guide().len(), 1);
        let reference = &package.guide()[0];
        assert_eq!(reference.guide_type, "text");
        assert_eq!(reference.path, "OEBPS/Text/ch1.xhtml");
        assert_eq!(reference.fragment.as_deref(), Some("start"));
    }

    #[test]
    fn test_lookups_by_path_and_id() {
        let package = minimal();
        assert_eq!(package.chapter_index_for_path("OEBPS/Text/ch1.xhtml"), Some(0));
        assert_eq!(
            package.chapter_index_for_path("epub://OEBPS/Text/ch 2.xhtml#x"),
            Some(1)
        );
        assert_eq!(package.chapter_index_for_id("img"), None);
        assert_eq!(package.spine_resource(1).unwrap().id, "c2");
    }

    #[test]
    fn test_missing_manifest_and_spine() {
        assert_eq!(
            parse_package(b"<package><spine/></package>", "p.opf"),
            Err(EpubError::MissingManifest)
        );
        assert_eq!(
            parse_package(b"<package><manifest/></package>", "p.opf"),
            Err(EpubError::MissingSpine)
        );
    }

    #[test]
    fn test_malformed_manifest_item() {
        let opf = br#"<package><manifest><item id="x" media-type="text/css"/></manifest><spine/></package>"#;
        assert_eq!(
            parse_package(opf, "p.opf"),
            Err(EpubError::MalformedManifestItem {
                attribute: "href",
                id: Some("x".to_string()),
            })
        );
        let opf = br#"<package><manifest><item href="a.css" media-type="text/css"/></manifest><spine/></package>"#;
        assert_eq!(
            parse_package(opf, "p.opf"),
            Err(EpubError::MalformedManifestItem {
                attribute: "id",
                id: None,
            })
        );
    }

    #[test]
    fn test_dangling_spine_ref() {
        let opf = br#"<package><manifest>
            <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
            </manifest><spine><itemref idref="c9"/></spine></package>"#;
        assert_eq!(
            parse_package(opf, "p.opf"),
            Err(EpubError::DanglingSpineRef {
                idref: "c9".to_string()
            })
        );
    }

    #[test]
    fn test_itemref_without_idref_is_dangling() {
        let opf = br#"<package><manifest/><spine><itemref/></spine></package>"#;
        assert_eq!(
            parse_package(opf, "p.opf"),
            Err(EpubError::DanglingSpineRef {
                idref: String::new()
            })
        );
    }

    #[test]
    fn test_package_at_archive_root() {
        let opf = br#"<package><manifest>
            <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
            </manifest><spine><itemref idref="c1"/></spine></package>"#;
        let package = parse_package(opf, "content.opf").unwrap();
        assert_eq!(package.base_dir(), "");
        assert_eq!(package.resource("c1").unwrap().path, "ch1.xhtml");
        assert_eq!(package.spine().len(), 1);
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let result = parse_package(b"<package><manifest><item id=\"a></manifest>", "p.opf");
        assert!(matches!(result, Err(EpubError::Parse(_))));
    }
}
