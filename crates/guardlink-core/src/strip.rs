//! Line Stripper (spec §4.2): turn one raw source line into either
//! "not a comment" ([`None`]) or the inner annotation text.
//!
//! The stripper is line-local: it never tracks whether a prior line left a
//! C-style block comment open. This is deliberate (spec §4.2) — legitimate
//! GAL usage lives in single-line comments or in Javadoc-style blocks where
//! every continuation line starts with `*`.

use crate::shapes::CommentShape;

/// Strip one line's comment delimiter(s), returning the inner text with
/// leading whitespace trimmed, or `None` if the line is not a comment.
pub fn strip_line(line: &str, shape: &CommentShape) -> Option<String> {
    let trimmed = line.trim_start();

    // Rule 1: single-line prefixes, longest first.
    let mut prefixes: Vec<&&str> = shape.line_prefixes.iter().collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
    for prefix in prefixes {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return Some(rest.trim_start().to_string());
        }
    }

    // Rule 2: Javadoc-style block continuation (`*` but not `*/`).
    if shape.block_continuation
        && trimmed.starts_with('*')
        && !trimmed.starts_with("*/")
    {
        let rest = &trimmed[1..];
        return Some(rest.trim_start().to_string());
    }

    // Rule 3: self-closing block forms. Only matches when the closer is
    // actually present on this line; otherwise rule 4 (block opener) applies.
    for (open, close) in shape.self_closing_blocks {
        if let Some(rest) = trimmed.strip_prefix(open) {
            if let Some(inner) = rest.strip_suffix(close) {
                return Some(inner.trim().to_string());
            }
        }
    }

    // Rule 4: block opener without a closer on the same line.
    if let Some(open) = shape.block_open {
        if let Some(rest) = trimmed.strip_prefix(open) {
            return Some(rest.trim_start().to_string());
        }
    }

    // Rule 5: not a comment.
    None
}
