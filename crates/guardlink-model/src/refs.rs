//! Reference normalization shared by assembly and validation (spec §4.8,
//! invariant I6): tables store references literally as written; only
//! validation-layer comparisons strip the leading `#` sigil.

pub fn strip_hash(s: &str) -> &str {
    s.strip_prefix('#').unwrap_or(s)
}

pub fn is_sigiled(s: &str) -> bool {
    s.starts_with('#') && s.len() > 1
}

pub fn refs_match(a: &str, b: &str) -> bool {
    strip_hash(a) == strip_hash(b)
}
