//! Archive path arithmetic and canonical `epub://` URIs
//!
//! Every href found in a package, navigation document or chapter is relative
//! to the resource that contains it. These helpers turn such hrefs into
//! archive-absolute paths (never escaping the archive root) and into the
//! `epub://<path>[#fragment]` form used for spine hrefs, TOC targets and
//! cross-references alike.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Scheme prefix of canonical resource URIs.
pub const EPUB_SCHEME: &str = "epub://";

/// Directory part of an archive path (`a/b/c.opf` -> `a/b`, `c.opf` -> ``).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Split `path#fragment` into its parts. An empty fragment counts as none.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) if !fragment.is_empty() => (path, Some(fragment)),
        Some((path, _)) => (path, None),
        None => (href, None),
    }
}

/// Remove the `epub://` scheme if present.
pub fn strip_scheme(uri: &str) -> &str {
    uri.strip_prefix(EPUB_SCHEME).unwrap_or(uri)
}

/// True for hrefs that point outside the archive.
pub fn is_external(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
}

/// Normalize an archive path: drop `.` and empty segments, let `..` pop
/// the previous segment. `..` at the root is clamped rather than rejected.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

/// Join a base directory with a relative href and normalize the result.
///
/// A leading `/` makes the href archive-absolute. Percent-escapes are
/// decoded so the result matches ZIP entry names.
pub fn join_path(base_dir: &str, href: &str) -> String {
    let href = percent_decode(href);
    if let Some(absolute) = href.strip_prefix('/') {
        return normalize_path(absolute);
    }
    if base_dir.is_empty() {
        normalize_path(&href)
    } else {
        normalize_path(&format!("{}/{}", base_dir, href))
    }
}

/// Resolve an href found inside `from_path` to an archive-absolute path,
/// discarding any fragment.
pub fn resolve_path(from_path: &str, href: &str) -> String {
    let (path, _) = split_fragment(href);
    if path.is_empty() {
        return normalize_path(from_path);
    }
    join_path(parent_dir(from_path), path)
}

/// Resolve an href found inside `from_path` to a canonical URI.
///
/// External hrefs are returned unchanged; a bare `#fragment` points into
/// `from_path` itself.
pub fn resolve_href(from_path: &str, href: &str) -> String {
    let href = href.trim();
    if is_external(href) {
        return href.to_string();
    }
    if let Some(already) = href.strip_prefix(EPUB_SCHEME) {
        return format!("{}{}", EPUB_SCHEME, already);
    }
    let (_, fragment) = split_fragment(href);
    let path = resolve_path(from_path, href);
    build_uri(&path, fragment)
}

/// Build `epub://<path>[#fragment]`.
pub fn build_uri(path: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(fragment) => format!("{}{}#{}", EPUB_SCHEME, path, fragment),
        None => format!("{}{}", EPUB_SCHEME, path),
    }
}

fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = hex_value(bytes[i + 1]);
            let lo = hex_value(bytes[i + 2]);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
