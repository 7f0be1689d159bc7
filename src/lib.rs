//! quire -- EPUB container parsing for paginated readers
//!
//! Opens an EPUB (ZIP container, package document, navigation) and offers
//! the pieces a column-paginated reader needs on top of it: reflow-safe
//! anchors into the rendered content, page arithmetic, and full-text
//! search with context snippets.
//!
//! # Features
//!
//! - `std` (default) -- ZIP reader, [`book::EpubBook`], search and pagination
//! - `async` -- tokio helpers for opening files and decoding chapters
//! - `cli` -- the `quire` command-line inspector
//!
//! Without `std` the crate is `no_std + alloc` and provides the package,
//! navigation, DOM and anchor layers over caller-supplied bytes.
//!
//! # Example
//!
//! ```rust,no_run
//! use quire::{search, EpubBook};
//!
//! # fn main() -> Result<(), quire::EpubError> {
//! let book = EpubBook::open_file("book.epub")?;
//! let doc = book.content_document()?;
//! if let Some(root) = quire::dom::DocumentTree::content_root(&doc) {
//!     for hit in search::search(&doc, root, "whale").take(5) {
//!         println!("{}", hit.highlighted);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(clippy::large_enum_variant, clippy::large_stack_arrays, clippy::redundant_clone)]
#![warn(
    clippy::box_collection,
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

extern crate alloc;

pub mod anchor;
pub mod css;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod navigation;
pub mod package;
pub mod uri;
mod xml;

#[cfg(feature = "std")]
pub mod book;

#[cfg(feature = "std")]
pub mod pagination;

#[cfg(feature = "std")]
pub mod search;

#[cfg(feature = "std")]
pub mod zip;

#[cfg(feature = "async")]
pub mod async_api;

// Re-export key types for convenience
pub use anchor::{Anchor, AnchoredRange};
#[cfg(feature = "async")]
pub use async_api::{
    load_reading_sequence_async, open_epub_file_async, open_epub_file_async_with_options,
};
#[cfg(feature = "std")]
pub use book::{
    ChapterContent, ChapterRef, CoverImage, EpubBook, EpubBookBuilder, EpubBookOptions,
    ReadingCursor, StylesheetRegistration, ValidationMode,
};
pub use dom::{Document, DocumentTree, NodeId};
pub use error::{AnchorParseError, EpubError, PaginationError, ZipError, ZipErrorKind};
pub use geometry::Rect;
pub use navigation::{NavPoint, Navigation};
pub use package::{Package, PackageMetadata, Resource, Spine, SpineItem};
#[cfg(feature = "std")]
pub use pagination::{ChapterAtPage, Paginator, ReadingDirection, TargetLocator};
#[cfg(feature = "std")]
pub use search::{SearchMatch, SearchOptions};
#[cfg(feature = "std")]
pub use zip::{Archive, ZipLimits};
