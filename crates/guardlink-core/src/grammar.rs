//! Annotation Line Parser (spec §4.4): parse one stripped comment line into
//! a typed [`Annotation`] or a parse diagnostic.

use std::sync::LazyLock;

use regex::Regex;

use crate::annotation::*;
use crate::normalize::{canonicalize, unescape_description};

static SIGILED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[A-Za-z0-9_-]+$").unwrap());
static DOTTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*(\.[A-Za-z_]\w*)*$").unwrap());
static EXT_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+:[A-Za-z0-9_:.\-]+$").unwrap());
static ID_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<rest>.*?)\s*\(#(?P<id>[A-Za-z0-9_-]+)\)\s*$").unwrap());
static SEVERITY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<rest>.*?)\s*\[(?P<sev>[A-Za-z0-9]+)\]\s*(?P<ext>.*)$").unwrap());

/// Result of parsing one annotation line.
pub enum ParseOutcome {
    /// A recognized, well-formed GAL verb.
    Parsed(Annotation),
    /// A recognized verb whose arguments did not match the grammar.
    Malformed { verb: String },
    /// No GAL verb at the start of the line (unknown `@verb` or plain text).
    NotAnAnnotation,
}

/// Parse a stripped comment line (the text after comment-delimiter removal).
pub fn parse_line(text: &str, location: SourceLocation) -> ParseOutcome {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('@') else {
        return ParseOutcome::NotAnAnnotation;
    };

    let (verb, args) = split_verb(rest);

    match verb {
        "shield:begin" => ParseOutcome::Parsed(Annotation::ShieldBegin(ShieldMarker { location })),
        "shield:end" => ParseOutcome::Parsed(Annotation::ShieldEnd(ShieldMarker { location })),
        "shield" => ParseOutcome::Parsed(Annotation::ShieldBegin(ShieldMarker { location })),
        "asset" => parse_asset(args, location),
        "threat" => parse_threat(args, location),
        "control" => parse_control(args, location),
        "mitigates" => parse_mitigates(args, location),
        "exposes" => parse_exposes(args, location),
        "accepts" => parse_accepts(args, location),
        "transfers" => parse_transfers(args, location),
        "flows" => parse_flows(args, location),
        "boundary" => parse_boundary(args, location),
        "validates" => parse_validates(args, location),
        "audit" | "review" => parse_audit(args, location),
        "owns" => parse_owns(args, location),
        "handles" => parse_handles(args, location),
        "assumes" => parse_assumes(args, location),
        "comment" => parse_comment(args, location),
        _ => ParseOutcome::NotAnAnnotation,
    }
}

fn split_verb(rest: &str) -> (&str, &str) {
    match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
        None => (rest, ""),
    }
}

fn malformed(verb: &str) -> ParseOutcome {
    ParseOutcome::Malformed { verb: verb.to_string() }
}

/// Parse a continuation line's `-- "…"` text (spec §4.5), honoring `\"` and
/// `\\` escapes. Returns `None` if `text` is not a continuation line.
pub fn parse_continuation(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix("-- \"")?;
    let mut end = None;
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == '"' {
            end = Some(i);
            break;
        }
    }
    let inner = match end {
        Some(i) => &rest[..i],
        None => rest,
    };
    Some(unescape_description(inner))
}

/// Split off a trailing `-- "…"` description, honoring `\"` and `\\` escapes.
/// Returns (arguments-before-description, Some(unescaped description) | None).
fn split_description(s: &str) -> (&str, Option<String>) {
    match s.find("-- \"") {
        None => (s.trim(), None),
        Some(idx) => {
            let before = s[..idx].trim();
            let after_marker = &s[idx + 4..];
            let mut end = None;
            let mut chars = after_marker.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if c == '\\' {
                    chars.next();
                } else if c == '"' {
                    end = Some(i);
                    break;
                }
            }
            let raw_inner = match end {
                Some(i) => &after_marker[..i],
                None => after_marker,
            };
            (before, Some(unescape_description(raw_inner)))
        }
    }
}

fn is_asset_ref(s: &str) -> bool {
    SIGILED_ID.is_match(s) || DOTTED_PATH.is_match(s)
}

fn is_ref_token(s: &str) -> bool {
    !s.is_empty() && !s.contains("  ")
}

/// Strip a trailing `(#id)` suffix, if present.
fn split_id_suffix(s: &str) -> (&str, Option<String>) {
    match ID_SUFFIX.captures(s) {
        Some(caps) => {
            let rest = caps.name("rest").unwrap().as_str();
            let id = caps.name("id").unwrap().as_str().to_string();
            (rest, Some(id))
        }
        None => (s, None),
    }
}

/// Strip a trailing `[severity] extref...` suffix, if present. Extrefs are
/// space-separated `kind:value` tokens that follow the severity bracket.
fn split_severity_and_ext_refs(s: &str) -> (&str, Option<crate::annotation::Severity>, Vec<String>) {
    match SEVERITY_SUFFIX.captures(s) {
        Some(caps) => {
            let rest = caps.name("rest").unwrap().as_str();
            let sev_token = caps.name("sev").unwrap().as_str();
            let ext_str = caps.name("ext").unwrap().as_str().trim();
            let severity = crate::annotation::Severity::parse(sev_token);
            if severity.is_none() {
                // Not actually a severity bracket; treat the whole thing as
                // part of the preceding reference instead.
                return (s, None, Vec::new());
            }
            let ext_refs = if ext_str.is_empty() {
                Vec::new()
            } else {
                ext_str
                    .split_whitespace()
                    .filter(|t| EXT_REF.is_match(t))
                    .map(|t| t.to_string())
                    .collect()
            };
            (rest, severity, ext_refs)
        }
        None => (s, None, Vec::new()),
    }
}

/// Split `s` on the first standalone occurrence of `keyword`, returning
/// (before, after) trimmed, or `None` if the keyword does not appear as a
/// separate word.
fn split_keyword<'a>(s: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let pattern = format!(r"(?:^|\s){}(?:\s|$)", regex::escape(keyword));
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(s)?;
    let kw_start = s[m.start()..].find(keyword).map(|off| m.start() + off)?;
    let kw_end = kw_start + keyword.len();
    Some((s[..kw_start].trim(), s[kw_end..].trim()))
}

fn parse_asset(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);
    let (before_id, id) = split_id_suffix(before_desc);
    let path_str = before_id.trim();

    if path_str.is_empty() || !DOTTED_PATH.is_match(path_str) {
        return malformed("asset");
    }

    let path: Vec<String> = path_str.split('.').map(|s| s.to_string()).collect();
    ParseOutcome::Parsed(Annotation::Asset(AssetAnnotation {
        location,
        path,
        id,
        description,
    }))
}

fn parse_threat(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);
    // Severity/ext-refs are the outermost trailing suffix; `(#id)` sits
    // between the name and that suffix, so peel severity first.
    let (before_sev, severity, external_refs) = split_severity_and_ext_refs(before_desc);
    let (name_str, id) = split_id_suffix(before_sev);
    let name = name_str.trim();

    if name.is_empty() {
        return malformed("threat");
    }

    ParseOutcome::Parsed(Annotation::Threat(ThreatAnnotation {
        location,
        name: name.to_string(),
        canonical_name: canonicalize(name),
        id,
        severity,
        external_refs,
        description,
    }))
}

fn parse_control(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);
    let (before_id, id) = split_id_suffix(before_desc);
    let name = before_id.trim();

    if name.is_empty() {
        return malformed("control");
    }

    ParseOutcome::Parsed(Annotation::Control(ControlAnnotation {
        location,
        name: name.to_string(),
        canonical_name: canonicalize(name),
        id,
        description,
    }))
}

fn parse_mitigates(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some((asset_part, after_against)) = split_keyword(before_desc, "against") else {
        return malformed("mitigates");
    };

    let (threat_part, control_ref) =
        match split_keyword(after_against, "using").or_else(|| split_keyword(after_against, "with")) {
            Some((threat_part, control_part)) => (threat_part, Some(control_part.to_string())),
            None => (after_against, None),
        };

    let asset_ref = asset_part.trim();
    let threat_ref = threat_part.trim();

    if !is_asset_ref(asset_ref) || !is_ref_token(threat_ref) {
        return malformed("mitigates");
    }
    if let Some(ref c) = control_ref {
        if !is_ref_token(c) {
            return malformed("mitigates");
        }
    }

    ParseOutcome::Parsed(Annotation::Mitigates(MitigatesAnnotation {
        location,
        asset_ref: asset_ref.to_string(),
        threat_ref: threat_ref.to_string(),
        control_ref,
        description,
    }))
}

fn parse_exposes(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some((asset_part, after_to)) = split_keyword(before_desc, "to") else {
        return malformed("exposes");
    };

    let (threat_part, severity, external_refs) = split_severity_and_ext_refs(after_to);
    let asset_ref = asset_part.trim();
    let threat_ref = threat_part.trim();

    if !is_asset_ref(asset_ref) || !is_ref_token(threat_ref) {
        return malformed("exposes");
    }

    ParseOutcome::Parsed(Annotation::Exposes(ExposesAnnotation {
        location,
        asset_ref: asset_ref.to_string(),
        threat_ref: threat_ref.to_string(),
        severity,
        external_refs,
        description,
    }))
}

fn parse_accepts(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let split = split_keyword(before_desc, "on").or_else(|| split_keyword(before_desc, "to"));
    let Some((threat_part, asset_part)) = split else {
        return malformed("accepts");
    };

    let threat_ref = threat_part.trim();
    let asset_ref = asset_part.trim();

    if !is_ref_token(threat_ref) || !is_asset_ref(asset_ref) {
        return malformed("accepts");
    }

    ParseOutcome::Parsed(Annotation::Accepts(AcceptsAnnotation {
        location,
        threat_ref: threat_ref.to_string(),
        asset_ref: asset_ref.to_string(),
        description,
    }))
}

fn parse_transfers(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some((threat_part, after_from)) = split_keyword(before_desc, "from") else {
        return malformed("transfers");
    };
    let Some((from_part, to_part)) = split_keyword(after_from, "to") else {
        return malformed("transfers");
    };

    let threat_ref = threat_part.trim();
    let from_asset = from_part.trim();
    let to_asset = to_part.trim();

    if !is_ref_token(threat_ref) || !is_asset_ref(from_asset) || !is_asset_ref(to_asset) {
        return malformed("transfers");
    }

    ParseOutcome::Parsed(Annotation::Transfers(TransfersAnnotation {
        location,
        threat_ref: threat_ref.to_string(),
        from_asset: from_asset.to_string(),
        to_asset: to_asset.to_string(),
        description,
    }))
}

fn parse_flows(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some(arrow_idx) = before_desc.find("->") else {
        return malformed("flows");
    };
    let source = before_desc[..arrow_idx].trim();
    let after_arrow = before_desc[arrow_idx + 2..].trim();

    let (target, mechanism) = match split_keyword(after_arrow, "via") {
        Some((target, mechanism)) => (target, Some(mechanism.to_string())),
        None => (after_arrow, None),
    };

    let target = target.trim();
    let mechanism = mechanism.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());

    if !is_asset_ref(source) || !is_asset_ref(target) {
        return malformed("flows");
    }

    ParseOutcome::Parsed(Annotation::Flows(FlowsAnnotation {
        location,
        source: source.to_string(),
        target: target.to_string(),
        mechanism,
        description,
    }))
}

fn parse_boundary(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);
    let (before_id, id) = split_id_suffix(before_desc);

    let body = before_id.strip_prefix("between").map(|r| r.trim()).unwrap_or(before_id.trim());

    let split = split_keyword(body, "and").or_else(|| {
        body.find('|').map(|idx| (body[..idx].trim(), body[idx + 1..].trim()))
    });

    let Some((a_part, b_part)) = split else {
        return malformed("boundary");
    };

    let asset_a = a_part.trim();
    let asset_b = b_part.trim();

    if !is_asset_ref(asset_a) || !is_asset_ref(asset_b) {
        return malformed("boundary");
    }

    ParseOutcome::Parsed(Annotation::Boundary(BoundaryAnnotation {
        location,
        asset_a: asset_a.to_string(),
        asset_b: asset_b.to_string(),
        id,
        description,
    }))
}

fn parse_validates(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some((control_part, asset_part)) = split_keyword(before_desc, "for") else {
        return malformed("validates");
    };

    let control_ref = control_part.trim();
    let asset_ref = asset_part.trim();

    if !is_ref_token(control_ref) || !is_asset_ref(asset_ref) {
        return malformed("validates");
    }

    ParseOutcome::Parsed(Annotation::Validates(ValidatesAnnotation {
        location,
        control_ref: control_ref.to_string(),
        asset_ref: asset_ref.to_string(),
        description,
    }))
}

fn parse_audit(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);
    let asset_ref = before_desc.trim();

    if !is_asset_ref(asset_ref) {
        return malformed("audit");
    }

    ParseOutcome::Parsed(Annotation::Audit(AuditAnnotation {
        location,
        asset_ref: asset_ref.to_string(),
        description,
    }))
}

fn parse_owns(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some((owner_part, asset_part)) = split_keyword(before_desc, "for") else {
        return malformed("owns");
    };

    let owner = owner_part.trim();
    let asset_ref = asset_part.trim();

    if owner.is_empty() || owner.contains(char::is_whitespace) || !is_asset_ref(asset_ref) {
        return malformed("owns");
    }

    ParseOutcome::Parsed(Annotation::Owns(OwnsAnnotation {
        location,
        owner: owner.to_string(),
        asset_ref: asset_ref.to_string(),
        description,
    }))
}

fn parse_handles(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);

    let Some((class_part, asset_part)) = split_keyword(before_desc, "on") else {
        return malformed("handles");
    };

    let Some(classification) = DataClassification::parse(class_part.trim()) else {
        return malformed("handles");
    };
    let asset_ref = asset_part.trim();

    if !is_asset_ref(asset_ref) {
        return malformed("handles");
    }

    ParseOutcome::Parsed(Annotation::Handles(HandlesAnnotation {
        location,
        classification,
        asset_ref: asset_ref.to_string(),
        description,
    }))
}

fn parse_assumes(args: &str, location: SourceLocation) -> ParseOutcome {
    let (before_desc, description) = split_description(args);
    let asset_ref = before_desc.trim();

    if !is_asset_ref(asset_ref) {
        return malformed("assumes");
    }

    ParseOutcome::Parsed(Annotation::Assumes(AssumesAnnotation {
        location,
        asset_ref: asset_ref.to_string(),
        description,
    }))
}

fn parse_comment(args: &str, location: SourceLocation) -> ParseOutcome {
    let (_before_desc, description) = split_description(args);
    ParseOutcome::Parsed(Annotation::Comment(CommentAnnotation { location, description }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("test.rs", 1)
    }

    #[test]
    fn parses_asset_with_id_and_description() {
        let outcome = parse_line(
            r#"@asset App.Auth.Login (#login) -- "Login endpoint""#,
            loc(),
        );
        match outcome {
            ParseOutcome::Parsed(Annotation::Asset(a)) => {
                assert_eq!(a.path, vec!["App", "Auth", "Login"]);
                assert_eq!(a.id.as_deref(), Some("login"));
                assert_eq!(a.description.as_deref(), Some("Login endpoint"));
            }
            _ => panic!("expected parsed asset"),
        }
    }

    #[test]
    fn parses_threat_with_severity_and_ext_refs() {
        let outcome = parse_line(
            r#"@threat SQL_Injection (#sqli) [critical] cwe:CWE-89 owasp:A03:2021 -- "Bad input""#,
            loc(),
        );
        match outcome {
            ParseOutcome::Parsed(Annotation::Threat(t)) => {
                assert_eq!(t.canonical_name, "sql_injection");
                assert_eq!(t.severity, Some(Severity::Critical));
                assert_eq!(
                    t.external_refs,
                    vec!["cwe:CWE-89".to_string(), "owasp:A03:2021".to_string()]
                );
            }
            _ => panic!("expected parsed threat"),
        }
    }

    #[test]
    fn flows_mechanism_does_not_swallow_description() {
        let outcome = parse_line(
            r#"@flows App.Frontend -> App.API via HTTPS/443 -- "TLS 1.3""#,
            loc(),
        );
        match outcome {
            ParseOutcome::Parsed(Annotation::Flows(f)) => {
                assert_eq!(f.source, "App.Frontend");
                assert_eq!(f.target, "App.API");
                assert_eq!(f.mechanism.as_deref(), Some("HTTPS/443"));
                assert_eq!(f.description.as_deref(), Some("TLS 1.3"));
            }
            _ => panic!("expected parsed flow"),
        }
    }

    #[test]
    fn flows_mechanism_with_multiple_words_parses_intact() {
        let outcome = parse_line(r#"@flows App.A -> App.B via gRPC over TLS"#, loc());
        match outcome {
            ParseOutcome::Parsed(Annotation::Flows(f)) => {
                assert_eq!(f.mechanism.as_deref(), Some("gRPC over TLS"));
                assert_eq!(f.description, None);
            }
            _ => panic!("expected parsed flow"),
        }
    }

    #[test]
    fn mitigates_accepts_legacy_with_synonym() {
        let outcome = parse_line("@mitigates App against #sqli with #waf", loc());
        match outcome {
            ParseOutcome::Parsed(Annotation::Mitigates(m)) => {
                assert_eq!(m.control_ref.as_deref(), Some("#waf"));
            }
            _ => panic!("expected parsed mitigates"),
        }
    }

    #[test]
    fn accepts_legacy_to_synonym() {
        let outcome = parse_line("@accepts #xss to App", loc());
        match outcome {
            ParseOutcome::Parsed(Annotation::Accepts(a)) => {
                assert_eq!(a.asset_ref, "App");
            }
            _ => panic!("expected parsed accepts"),
        }
    }

    #[test]
    fn boundary_requires_two_assets() {
        let outcome = parse_line("@boundary between App.Frontend and App.Backend (#b1)", loc());
        match outcome {
            ParseOutcome::Parsed(Annotation::Boundary(b)) => {
                assert_eq!(b.asset_a, "App.Frontend");
                assert_eq!(b.asset_b, "App.Backend");
                assert_eq!(b.id.as_deref(), Some("b1"));
            }
            _ => panic!("expected parsed boundary"),
        }
    }

    #[test]
    fn boundary_with_only_one_asset_is_malformed() {
        let outcome = parse_line("@boundary App.Frontend", loc());
        assert!(matches!(outcome, ParseOutcome::Malformed { .. }));
    }

    #[test]
    fn handles_classification_case_insensitive() {
        let outcome = parse_line("@handles PII on App.Users", loc());
        match outcome {
            ParseOutcome::Parsed(Annotation::Handles(h)) => {
                assert_eq!(h.classification, DataClassification::Pii);
            }
            _ => panic!("expected parsed handles"),
        }
    }

    #[test]
    fn unknown_verb_is_not_an_annotation() {
        let outcome = parse_line("@param foo the thing", loc());
        assert!(matches!(outcome, ParseOutcome::NotAnAnnotation));
    }

    #[test]
    fn known_verb_with_bad_args_is_malformed() {
        let outcome = parse_line("@mitigates", loc());
        assert!(matches!(outcome, ParseOutcome::Malformed { .. }));
    }

    #[test]
    fn continuation_line_unescapes_text() {
        assert_eq!(
            parse_continuation(r#"-- "steals \"token\"""#),
            Some("steals \"token\"".to_string())
        );
    }

    #[test]
    fn non_continuation_line_returns_none() {
        assert_eq!(parse_continuation("@asset Foo"), None);
    }

    #[test]
    fn plain_text_is_not_an_annotation() {
        let outcome = parse_line("just a regular comment", loc());
        assert!(matches!(outcome, ParseOutcome::NotAnAnnotation));
    }
}
