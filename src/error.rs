//! Unified error types for quire
//!
//! Provides a top-level `EpubError` covering every way a load can fail,
//! plus `From` impls so `?` works across module boundaries. Per-item
//! lookups (missing resources, unresolved anchors) are not errors and
//! return `Option` instead.

extern crate alloc;

use alloc::string::String;
use core::fmt;

/// Top-level error type for loading an EPUB container.
///
/// Every variant is terminal for the load it occurs in; a later load is
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EpubError {
    /// The byte container could not be read as a ZIP archive
    CorruptArchive(ZipError),
    /// `META-INF/container.xml` is absent or has no `rootfile@full-path`
    MissingRootPointer,
    /// Package document has no `<manifest>` element
    MissingManifest,
    /// Package document has no `<spine>` element
    MissingSpine,
    /// A manifest `<item>` lacks a required attribute
    MalformedManifestItem {
        /// Name of the missing attribute (`id`, `href` or `media-type`).
        attribute: &'static str,
        /// Manifest `id` of the item, when it had one.
        id: Option<String>,
    },
    /// A spine `<itemref>` points at an id that is not in the manifest
    DanglingSpineRef {
        /// The unresolved `idref` (empty when the attribute was missing).
        idref: String,
    },
    /// The navigation document does not have the structure its dialect requires
    InvalidNavigationDocument(String),
    /// XML syntax error in a structural document
    Parse(String),
    /// The `mimetype` entry is missing or wrong (strict loads only)
    InvalidMimetype(String),
    /// A required archive entry (container or package document) is missing
    ResourceMissing {
        /// Archive path that was requested.
        path: String,
    },
    /// I/O error (description only, since `std::io::Error` is not `Clone`)
    Io(String),
    /// Chapter index requested is out of bounds
    ChapterOutOfBounds {
        /// Requested chapter index.
        index: usize,
        /// Total number of chapters available.
        chapter_count: usize,
    },
    /// Chapter content could not be decoded as UTF-8
    ChapterNotUtf8 {
        /// Chapter path in the archive.
        path: String,
    },
}

impl fmt::Display for EpubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpubError::CorruptArchive(kind) => write!(f, "Corrupt archive: {}", kind),
            EpubError::MissingRootPointer => {
                write!(f, "META-INF/container.xml has no rootfile full-path")
            }
            EpubError::MissingManifest => write!(f, "Package document has no manifest"),
            EpubError::MissingSpine => write!(f, "Package document has no spine"),
            EpubError::MalformedManifestItem { attribute, id } => match id {
                Some(id) => write!(
                    f,
                    "Manifest item '{}' is missing the '{}' attribute",
                    id, attribute
                ),
                None => write!(f, "Manifest item is missing the '{}' attribute", attribute),
            },
            EpubError::DanglingSpineRef { idref } => {
                write!(f, "Spine item '{}' does not exist in manifest", idref)
            }
            EpubError::InvalidNavigationDocument(msg) => {
                write!(f, "Invalid navigation document: {}", msg)
            }
            EpubError::Parse(msg) => write!(f, "Parse error: {}", msg),
            EpubError::InvalidMimetype(msg) => write!(f, "Invalid mimetype: {}", msg),
            EpubError::ResourceMissing { path } => {
                write!(f, "Required resource missing from archive: {}", path)
            }
            EpubError::Io(msg) => write!(f, "I/O error: {}", msg),
            EpubError::ChapterOutOfBounds {
                index,
                chapter_count,
            } => write!(
                f,
                "Chapter index {} out of bounds (chapter count: {})",
                index, chapter_count
            ),
            EpubError::ChapterNotUtf8 { path } => {
                write!(f, "Chapter content is not valid UTF-8: {}", path)
            }
        }
    }
}

/// ZIP-specific error variants
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ZipErrorKind {
    /// Invalid ZIP format
    InvalidFormat,
    /// Unsupported compression method
    UnsupportedCompression,
    /// Decompression failed
    DecompressError,
    /// CRC32 mismatch
    CrcMismatch,
    /// Central directory holds more entries than the configured limit
    CentralDirFull,
    /// File exceeds maximum allowed size
    FileTooLarge,
    /// ZIP64 structures are present but unsupported
    UnsupportedZip64,
}

/// Public ZIP error type alias used across the crate API.
pub type ZipError = ZipErrorKind;

impl fmt::Display for ZipErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZipErrorKind::InvalidFormat => write!(f, "invalid ZIP format"),
            ZipErrorKind::UnsupportedCompression => write!(f, "unsupported compression method"),
            ZipErrorKind::DecompressError => write!(f, "decompression failed"),
            ZipErrorKind::CrcMismatch => write!(f, "CRC32 checksum mismatch"),
            ZipErrorKind::CentralDirFull => write!(f, "central directory full"),
            ZipErrorKind::FileTooLarge => write!(f, "file too large"),
            ZipErrorKind::UnsupportedZip64 => write!(f, "ZIP64 is not supported"),
        }
    }
}

/// Errors raised while configuring pagination.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum PaginationError {
    /// Page size must be finite and strictly positive
    InvalidPageSize(f64),
}

impl fmt::Display for PaginationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationError::InvalidPageSize(size) => {
                write!(f, "page size must be finite and > 0, got {}", size)
            }
        }
    }
}

/// An address string that does not follow the anchor grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorParseError {
    /// The offending step or marker
    pub fragment: String,
}

impl fmt::Display for AnchorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed anchor step '{}'", self.fragment)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EpubError {}

#[cfg(feature = "std")]
impl std::error::Error for AnchorParseError {}

#[cfg(feature = "std")]
impl std::error::Error for ZipErrorKind {}

#[cfg(feature = "std")]
impl std::error::Error for PaginationError {}

impl From<ZipErrorKind> for EpubError {
    fn from(err: ZipErrorKind) -> Self {
        EpubError::CorruptArchive(err)
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(err: quick_xml::Error) -> Self {
        EpubError::Parse(alloc::format!("XML parse error: {:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    #[test]
    fn test_epub_error_display() {
        let err = EpubError::Parse("bad xml".into());
        assert_eq!(format!("{}", err), "Parse error: bad xml");
    }

    #[test]
    fn test_dangling_spine_ref_display_names_idref() {
        let err = EpubError::DanglingSpineRef {
            idref: "chapter9".to_string(),
        };
        assert!(err.to_string().contains("chapter9"));
    }

    #[test]
    fn test_malformed_manifest_item_display() {
        let with_id = EpubError::MalformedManifestItem {
            attribute: "href",
            id: Some("c1".to_string()),
        };
        assert_eq!(
            with_id.to_string(),
            "Manifest item 'c1' is missing the 'href' attribute"
        );
        let without_id = EpubError::MalformedManifestItem {
            attribute: "id",
            id: None,
        };
        assert_eq!(
            without_id.to_string(),
            "Manifest item is missing the 'id' attribute"
        );
    }

    #[test]
    fn test_zip_error_converts_to_corrupt_archive() {
        let err: EpubError = ZipErrorKind::InvalidFormat.into();
        assert_eq!(err, EpubError::CorruptArchive(ZipErrorKind::InvalidFormat));
        assert!(format!("{}", err).contains("Corrupt archive"));
    }

    #[test]
    fn test_zip_error_kinds_display_distinctly() {
        // Missing entries surface as `None` from the archive, never as an error kind
        let kinds = [
            ZipErrorKind::InvalidFormat,
            ZipErrorKind::UnsupportedCompression,
            ZipErrorKind::DecompressError,
            ZipErrorKind::CrcMismatch,
            ZipErrorKind::CentralDirFull,
            ZipErrorKind::FileTooLarge,
            ZipErrorKind::UnsupportedZip64,
        ];
        let shown: alloc::vec::Vec<_> = kinds.iter().map(|k| k.to_string()).collect();
        for (i, text) in shown.iter().enumerate() {
            assert!(!text.is_empty());
            assert!(!shown[i + 1..].contains(text), "duplicate message {text:?}");
        }
    }

    #[test]
    fn test_pagination_error_display() {
        let err = PaginationError::InvalidPageSize(0.0);
        assert!(err.to_string().contains("got 0"));
    }
}
