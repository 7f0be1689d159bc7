//! Stylesheet scoping for the assembled content document
//!
//! Book stylesheets are written against a standalone page. Once chapters
//! are stitched under the content root their selectors have to be confined
//! to it: every selector gains a `.text-epub` prefix and `body` becomes the
//! chapter wrapper. Only the selector preludes are rewritten; declarations,
//! comments and at-rule bodies are copied through unchanged.

extern crate alloc;

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::dom::{CHAPTER_BODY_CLASS, CONTENT_ROOT_CLASS};

/// At-rules whose blocks contain ordinary style rules.
const NESTING_AT_RULES: &[&str] = &["media", "supports", "document", "-moz-document", "layer"];

/// Confine every style rule in `css` to the content root.
pub fn scope_stylesheet(css: &str) -> String {
    let mut out = String::with_capacity(css.len() + css.len() / 4);
    scope_rules(css, &mut out);
    out
}

fn scope_rules(css: &str, out: &mut String) {
    let mut pos = 0;
    while pos < css.len() {
        let next = skip_whitespace_and_comments(css, pos);
        out.push_str(&css[pos..next]);
        pos = next;
        if pos >= css.len() {
            break;
        }

        let rest = &css[pos..];
        let Some(open) = find_outside_strings(rest, |b| matches!(b, b'{' | b'}' | b';')) else {
            out.push_str(rest);
            return;
        };
        // Statement at-rules (@import, @charset) and stray terminators
        if rest.as_bytes()[open] != b'{' {
            out.push_str(&rest[..=open]);
            pos += open + 1;
            continue;
        }

        let Some(close) = block_end(rest, open) else {
            log::debug!("[EPUB] Unclosed stylesheet block at byte {}", pos);
            out.push_str(rest);
            return;
        };
        let prelude = &rest[..open];
        let body = &rest[open + 1..close];

        if let Some(at_rule) = prelude.strip_prefix('@') {
            let name = at_rule
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            out.push_str(prelude);
            out.push('{');
            if NESTING_AT_RULES.contains(&name.as_str()) {
                scope_rules(body, out);
            } else {
                out.push_str(body);
            }
            out.push('}');
        } else {
            let trailing = &prelude[prelude.trim_end().len()..];
            out.push_str(&scope_selector_list(prelude.trim_end()));
            out.push_str(trailing);
            out.push('{');
            out.push_str(body);
            out.push('}');
        }
        pos += close + 1;
    }
}

/// Prefix each selector of a comma-separated list.
pub fn scope_selector_list(list: &str) -> String {
    split_selector_list(list)
        .into_iter()
        .map(|selector| scope_selector(selector.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prefix a single selector with the content root class.
///
/// `html` collapses into the content root and `body` becomes the chapter
/// wrapper, so `body p` scopes to `.text-epub div.chapter-body p`.
pub fn scope_selector(selector: &str) -> String {
    let root = format!(".{}", CONTENT_ROOT_CLASS);
    if selector.is_empty() || selector.starts_with(&root) {
        return selector.to_string();
    }
    let rest = strip_leading_type(selector, "html").map(str::trim_start);
    let selector = match rest {
        Some("") => return root,
        Some(rest) => rest,
        None => selector,
    };
    match strip_leading_type(selector, "body") {
        Some(rest) => format!("{} div.{}{}", root, CHAPTER_BODY_CLASS, rest),
        None => format!("{} {}", root, selector),
    }
}

/// Remainder of `selector` after a leading type selector `tag`.
fn strip_leading_type<'a>(selector: &'a str, tag: &str) -> Option<&'a str> {
    let head = selector.get(..tag.len())?;
    if !head.eq_ignore_ascii_case(tag) {
        return None;
    }
    let rest = &selector[tag.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || matches!(c, '.' | '#' | ':' | '[' | '>' | '+' | '~') => {
            Some(rest)
        }
        Some(_) => None,
    }
}

/// Split on commas outside parentheses, brackets and strings.
fn split_selector_list(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let bytes = list.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) if b == b'\\' => i += 1,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'\\' => i += 1,
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    parts.push(&list[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&list[start..]);
    parts.retain(|p| !p.trim().is_empty());
    parts
}

/// Skip whitespace and CSS comments (`/* ... */`)
fn skip_whitespace_and_comments(css: &str, mut pos: usize) -> usize {
    let bytes = css.as_bytes();
    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
        } else if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'*' {
            match css[pos + 2..].find("*/") {
                Some(end) => pos = pos + 2 + end + 2,
                None => return bytes.len(),
            }
        } else {
            break;
        }
    }
    pos
}

/// First byte matching `pred` that is not inside a string or comment.
fn find_outside_strings(css: &str, pred: impl Fn(u8) -> bool) -> Option<usize> {
    let bytes = css.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) if b == b'\\' => i += 1,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'\\' => i += 1,
            None if b == b'/' && bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map(|end| i + 2 + end + 1)?;
            }
            None if pred(b) => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// Index of the `}` closing the block opened at `open`.
fn block_end(css: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = open;
    loop {
        let at = pos + find_outside_strings(&css[pos..], |b| b == b'{' || b == b'}')?;
        if css.as_bytes()[at] == b'{' {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(at);
            }
        }
        pos = at + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_selectors_are_prefixed() {
        assert_eq!(scope_selector("p"), ".text-epub p");
        assert_eq!(scope_selector("h1.title > em"), ".text-epub h1.title > em");
        assert_eq!(scope_selector(".text-epub p"), ".text-epub p");
    }

    #[test]
    fn test_body_and_html_map_to_wrappers() {
        assert_eq!(scope_selector("body"), ".text-epub div.chapter-body");
        assert_eq!(scope_selector("BODY.front p"), ".text-epub div.chapter-body.front p");
        assert_eq!(scope_selector("html"), ".text-epub");
        assert_eq!(scope_selector("html body"), ".text-epub div.chapter-body");
        assert_eq!(scope_selector("html > h1"), ".text-epub > h1");
        assert_eq!(scope_selector("bodytext"), ".text-epub bodytext");
    }

    #[test]
    fn test_selector_lists_split_outside_parentheses() {
        assert_eq!(
            scope_selector_list("h1, h2,p:not(.a, .b)"),
            ".text-epub h1, .text-epub h2, .text-epub p:not(.a, .b)"
        );
        assert_eq!(
            scope_selector_list(r#"a[title="x,y"]"#),
            r#".text-epub a[title="x,y"]"#
        );
    }

    #[test]
    fn test_stylesheet_rules_and_comments() {
        let css = "/* intro */\nbody { margin: 0; }\nh1, h2 { color: red; }";
        assert_eq!(
            scope_stylesheet(css),
            "/* intro */\n.text-epub div.chapter-body { margin: 0; }\n.text-epub h1, .text-epub h2 { color: red; }"
        );
    }

    #[test]
    fn test_at_rules() {
        let css = "@charset \"utf-8\";\n@import url(a.css);\n\
                   @font-face { font-family: X; src: url(x.ttf); }\n\
                   @media screen and (min-width: 10em) { p { color: blue; } }";
        assert_eq!(
            scope_stylesheet(css),
            "@charset \"utf-8\";\n@import url(a.css);\n\
             @font-face { font-family: X; src: url(x.ttf); }\n\
             @media screen and (min-width: 10em) { .text-epub p { color: blue; } }"
        );
    }

    #[test]
    fn test_braces_in_strings_and_unclosed_blocks() {
        assert_eq!(
            scope_stylesheet(r#"p::after { content: "}"; }"#),
            r#".text-epub p::after { content: "}"; }"#
        );
        assert_eq!(scope_stylesheet("p { color: red;"), "p { color: red;");
    }
}
