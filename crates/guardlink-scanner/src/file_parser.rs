//! File Parser (spec §4.5): walk a file line-by-line, manage continuation
//! lines and shield blocks, and yield annotations plus diagnostics.
//!
//! Pure function: takes a relative path and file content, returns an owned
//! list of annotations and diagnostics. No I/O happens here — that keeps
//! parallelism and testing trivial (spec §9, "scanning vs parsing split").

use guardlink_core::{
    parse_continuation, parse_line, shape_for_extension, strip_line, Annotation, Diagnostic,
    ParseOutcome, SourceLocation,
};

/// Parse one file's contents into annotations and diagnostics.
///
/// `rel_path` must already be normalized: relative to the scan root,
/// forward-slash separated (spec §4.6).
pub fn parse_file(rel_path: &str, content: &str) -> (Vec<Annotation>, Vec<Diagnostic>) {
    let ext = extension_of(rel_path);
    let shape = shape_for_extension(ext);

    let mut annotations: Vec<Annotation> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut last_annotation: Option<usize> = None;
    let mut in_shield = false;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;

        let Some(stripped) = strip_line(raw_line, &shape) else {
            last_annotation = None;
            continue;
        };

        let is_shield_end = stripped.trim_start().starts_with("@shield:end");
        if in_shield && !is_shield_end {
            continue;
        }

        if let Some(text) = parse_continuation(&stripped) {
            if let Some(idx) = last_annotation {
                annotations[idx].append_description(&text);
            }
            continue;
        }

        let location = SourceLocation::new(rel_path.to_string(), line_no);
        match parse_line(&stripped, location) {
            ParseOutcome::Parsed(annotation) => {
                match &annotation {
                    Annotation::ShieldBegin(_) => in_shield = true,
                    Annotation::ShieldEnd(_) => in_shield = false,
                    _ => {}
                }
                annotations.push(annotation);
                last_annotation = Some(annotations.len() - 1);
            }
            ParseOutcome::Malformed { verb } => {
                log::debug!("{}:{}: malformed @{} annotation", rel_path, line_no, verb);
                diagnostics.push(
                    Diagnostic::error(
                        rel_path.to_string(),
                        line_no,
                        format!("malformed @{} annotation: could not parse arguments", verb),
                    )
                    .with_raw(raw_line.to_string()),
                );
                last_annotation = None;
            }
            ParseOutcome::NotAnAnnotation => {
                last_annotation = None;
            }
        }
    }

    (annotations, diagnostics)
}

fn extension_of(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path).rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardlink_core::DiagnosticLevel;

    #[test]
    fn continuation_lines_join_with_single_space() {
        let content = "// @threat Session (#hijack) [P1]\n// -- \"steals token\"\n// -- \"on shared nets\"\n";
        let (anns, diags) = parse_file("app.rs", content);
        assert!(diags.is_empty());
        assert_eq!(anns.len(), 1);
        match &anns[0] {
            Annotation::Threat(t) => {
                assert_eq!(t.description.as_deref(), Some("steals token on shared nets"));
            }
            _ => panic!("expected threat"),
        }
    }

    #[test]
    fn shield_block_hides_its_contents() {
        let content = "\
// @shield:begin
// @asset Secret.Internal (#secret)
// some notes nobody should see
// @shield:end
";
        let (anns, diags) = parse_file("app.rs", content);
        assert!(diags.is_empty());
        assert_eq!(anns.len(), 2);
        assert!(matches!(anns[0], Annotation::ShieldBegin(_)));
        assert!(matches!(anns[1], Annotation::ShieldEnd(_)));
    }

    #[test]
    fn malformed_annotation_resets_continuation_chain() {
        let content = "// @mitigates\n// -- \"orphaned continuation\"\n";
        let (anns, diags) = parse_file("app.rs", content);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].level, DiagnosticLevel::Error);
        assert!(anns.is_empty());
    }

    #[test]
    fn unknown_verb_is_silently_ignored() {
        let content = "// @param foo the thing\n// @asset App.Login\n";
        let (anns, diags) = parse_file("app.rs", content);
        assert!(diags.is_empty());
        assert_eq!(anns.len(), 1);
    }

    #[test]
    fn non_comment_line_breaks_continuation_chain() {
        let content = "// @threat Foo [P2]\nlet x = 1;\n// -- \"late description\"\n";
        let (anns, _diags) = parse_file("app.rs", content);
        assert_eq!(anns.len(), 1);
        match &anns[0] {
            Annotation::Threat(t) => assert_eq!(t.description, None),
            _ => panic!("expected threat"),
        }
    }

    #[test]
    fn javadoc_style_continuation_across_block_lines() {
        let content = "/**\n * @threat Foo (#f) [P2]\n * -- \"more detail\"\n */\n";
        let (anns, diags) = parse_file("app.java", content);
        assert!(diags.is_empty());
        assert_eq!(anns.len(), 1);
        match &anns[0] {
            Annotation::Threat(t) => assert_eq!(t.description.as_deref(), Some("more detail")),
            _ => panic!("expected threat"),
        }
    }
}
