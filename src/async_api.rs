//! Optional async helpers for opening and decoding books.
//!
//! This module is available with the `async` feature. Parsing itself is
//! synchronous; these helpers only keep file reads and chapter decoding
//! off the calling task.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::book::{ChapterContent, EpubBook, EpubBookOptions};
use crate::error::EpubError;

/// Read an EPUB file asynchronously and open it as an `EpubBook`.
pub async fn open_epub_file_async<P: AsRef<Path>>(path: P) -> Result<EpubBook, EpubError> {
    open_epub_file_async_with_options(path, EpubBookOptions::default()).await
}

/// Read an EPUB file asynchronously and open it with explicit options.
pub async fn open_epub_file_async_with_options<P: AsRef<Path>>(
    path: P,
    options: EpubBookOptions,
) -> Result<EpubBook, EpubError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| EpubError::Io(e.to_string()))?;
    tokio::task::spawn_blocking(move || EpubBook::open_with_options(bytes, options))
        .await
        .map_err(|e| EpubError::Io(e.to_string()))?
}

/// Decode every chapter concurrently and return them in spine order.
///
/// Each chapter is decoded on the blocking pool. The first failing chapter
/// (in spine order) aborts the whole sequence.
pub async fn load_reading_sequence_async(
    book: Arc<EpubBook>,
) -> Result<Vec<ChapterContent>, EpubError> {
    let mut tasks = JoinSet::new();
    for index in 0..book.chapter_count() {
        let book = Arc::clone(&book);
        tasks.spawn_blocking(move || (index, book.chapter_content(index)));
    }

    let mut results = Vec::with_capacity(book.chapter_count());
    while let Some(joined) = tasks.join_next().await {
        let (index, chapter) = joined.map_err(|e| EpubError::Io(e.to_string()))?;
        results.push((index, chapter));
    }
    results.sort_by_key(|(index, _)| *index);

    log::debug!("[EPUB] Decoded {} chapters asynchronously", results.len());
    results.into_iter().map(|(_, chapter)| chapter).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::tests::{build_zip, TestEntry};

    fn two_chapter_book() -> Vec<u8> {
        build_zip(&[
            TestEntry::stored("mimetype", b"application/epub+zip"),
            TestEntry::stored(
                "META-INF/container.xml",
                br#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#,
            ),
            TestEntry::deflated(
                "content.opf",
                br#"<package><metadata/><manifest>
                    <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
                    <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>
                </manifest><spine><itemref idref="a"/><itemref idref="b"/></spine></package>"#,
            ),
            TestEntry::deflated("a.xhtml", b"<html><body><a href=\"b.xhtml\">next</a></body></html>"),
            TestEntry::deflated("b.xhtml", b"<html><body><p>end</p></body></html>"),
        ])
    }

    #[tokio::test]
    async fn test_reading_sequence_keeps_spine_order() {
        let book = Arc::new(EpubBook::open(two_chapter_book()).unwrap());
        let chapters = load_reading_sequence_async(Arc::clone(&book)).await.unwrap();
        assert_eq!(chapters, book.reading_sequence().unwrap());
        assert_eq!(chapters[0].id, "a");
        assert!(chapters[0].markup.contains("epub://b.xhtml"));
        assert_eq!(chapters[1].id, "b");
    }

    #[tokio::test]
    async fn test_open_missing_file_is_io_error() {
        let result = open_epub_file_async("/definitely/not/here.epub").await;
        assert!(matches!(result, Err(EpubError::Io(_))));
    }
}
