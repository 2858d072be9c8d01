//! Name Normalizer (spec §4.3): canonicalize human names, resolve severity
//! and data-classification aliases, and unescape description strings.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize a human name: NFKC normalize, lowercase, collapse whitespace
/// and hyphen runs to `_`, collapse consecutive `_`, trim leading/trailing `_`.
pub fn canonicalize(name: &str) -> String {
    let nfkc: String = name.nfkc().collect();
    let lowered = nfkc.to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut last_was_sep = false;
    for c in lowered.chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            if !last_was_sep {
                collapsed.push('_');
                last_was_sep = true;
            }
        } else {
            collapsed.push(c);
            last_was_sep = false;
        }
    }

    collapsed.trim_matches('_').to_string()
}

/// Unescape a GAL description string: `\"` -> `"`, `\\` -> `\`. No other
/// escape sequences are recognized (spec §4.3).
pub fn unescape_description(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"') => {
                    out.push('"');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(canonicalize("SQL  Injection"), "sql_injection");
    }

    #[test]
    fn collapses_hyphens() {
        assert_eq!(canonicalize("Cross-Site-Scripting"), "cross_site_scripting");
    }

    #[test]
    fn trims_leading_trailing_separators() {
        assert_eq!(canonicalize("  _Foo_  "), "foo");
    }

    #[test]
    fn mixed_separators_collapse_together() {
        assert_eq!(canonicalize("Session - Hijack__Risk"), "session_hijack_risk");
    }

    #[test]
    fn nfkc_normalizes_compatibility_characters() {
        // U+FF21 FULLWIDTH LATIN CAPITAL LETTER A -> "a"
        assert_eq!(canonicalize("\u{FF21}sset"), "asset");
    }

    #[test]
    fn unescape_handles_quote_and_backslash() {
        assert_eq!(unescape_description(r#"She said \"hi\""#), "She said \"hi\"");
        assert_eq!(unescape_description(r"C:\\path"), r"C:\path");
    }

    #[test]
    fn unescape_leaves_other_sequences_untouched() {
        assert_eq!(unescape_description(r"a\nb"), r"a\nb");
    }
}
