//! Model Assembler (C7, spec §4.7): project a flat annotation stream into a
//! typed [`ThreatModel`], detecting duplicate ids and inheriting severity.

use std::collections::{HashMap, HashSet};

use guardlink_core::{Annotation, Diagnostic};

use crate::model::{Coverage, ThreatModel, SCHEMA_VERSION};
use crate::refs::{is_sigiled, strip_hash};

/// Assemble a [`ThreatModel`] from a flat annotation stream produced by the
/// scanner, plus any diagnostics the scan itself already raised.
///
/// `scanned_files` is every file the scanner visited, in scan order.
/// `scan_diagnostics` are diagnostics already raised by the scanner/parser
/// (malformed lines, unreadable files); they are merged with diagnostics
/// raised during assembly (duplicate ids) and returned alongside the model.
pub fn assemble(
    project: impl Into<String>,
    definitions_dir: &str,
    scanned_files: Vec<String>,
    annotations: Vec<Annotation>,
    mut scan_diagnostics: Vec<Diagnostic>,
) -> (ThreatModel, Vec<Diagnostic>) {
    let mut model = ThreatModel {
        version: SCHEMA_VERSION.to_string(),
        project: project.into(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        source_files: scanned_files.len(),
        annotations_parsed: annotations.len(),
        annotated_files: Vec::new(),
        unannotated_files: Vec::new(),
        assets: Vec::new(),
        threats: Vec::new(),
        controls: Vec::new(),
        mitigations: Vec::new(),
        exposures: Vec::new(),
        acceptances: Vec::new(),
        transfers: Vec::new(),
        flows: Vec::new(),
        boundaries: Vec::new(),
        validations: Vec::new(),
        audits: Vec::new(),
        ownership: Vec::new(),
        data_handling: Vec::new(),
        assumptions: Vec::new(),
        shields: Vec::new(),
        comments: Vec::new(),
        coverage: Coverage::compute(0, 0),
    };

    let mut id_locations: HashMap<String, guardlink_core::SourceLocation> = HashMap::new();
    let mut files_with_annotations: HashSet<String> = HashSet::new();
    let definitions_prefix = format!("{}/", definitions_dir);

    let mut check_duplicate = |id: &Option<String>,
                                location: &guardlink_core::SourceLocation,
                                diagnostics: &mut Vec<Diagnostic>| {
        let Some(id) = id else { return };
        match id_locations.get(id) {
            Some(first) => {
                log::warn!("duplicate id #{} ({}:{} vs {}:{})", id, location.file, location.line, first.file, first.line);
                diagnostics.push(Diagnostic::error(
                    location.file.clone(),
                    location.line,
                    format!(
                        "duplicate id #{}: already defined at {}:{}",
                        id, first.file, first.line
                    ),
                ));
            }
            None => {
                id_locations.insert(id.clone(), location.clone());
            }
        }
    };

    for annotation in annotations {
        files_with_annotations.insert(annotation.location().file.clone());

        match annotation {
            Annotation::Asset(a) => {
                check_duplicate(&a.id, &a.location, &mut scan_diagnostics);
                model.assets.push(a);
            }
            Annotation::Threat(t) => {
                check_duplicate(&t.id, &t.location, &mut scan_diagnostics);
                model.threats.push(t);
            }
            Annotation::Control(c) => {
                check_duplicate(&c.id, &c.location, &mut scan_diagnostics);
                model.controls.push(c);
            }
            Annotation::Boundary(b) => {
                check_duplicate(&b.id, &b.location, &mut scan_diagnostics);
                model.boundaries.push(b);
            }
            Annotation::Mitigates(m) => model.mitigations.push(m),
            Annotation::Exposes(e) => model.exposures.push(e),
            Annotation::Accepts(a) => model.acceptances.push(a),
            Annotation::Transfers(t) => model.transfers.push(t),
            Annotation::Flows(f) => model.flows.push(f),
            Annotation::Validates(v) => model.validations.push(v),
            Annotation::Audit(a) => model.audits.push(a),
            Annotation::Owns(o) => model.ownership.push(o),
            Annotation::Handles(h) => model.data_handling.push(h),
            Annotation::Assumes(a) => model.assumptions.push(a),
            Annotation::Comment(c) => model.comments.push(c),
            Annotation::ShieldBegin(s) => model.shields.push(s),
            Annotation::ShieldEnd(s) => model.shields.push(s),
        }
    }

    // Severity inheritance pass (I4): exposures with no inline severity
    // inherit the severity of the threat they name by sigiled-id match.
    let threat_severity_by_id: HashMap<String, guardlink_core::Severity> = model
        .threats
        .iter()
        .filter_map(|t| t.id.as_ref().zip(t.severity).map(|(id, sev)| (id.clone(), sev)))
        .collect();

    for exposure in &mut model.exposures {
        if exposure.severity.is_none() && is_sigiled(&exposure.threat_ref) {
            let id = strip_hash(&exposure.threat_ref);
            if let Some(sev) = threat_severity_by_id.get(id) {
                exposure.severity = Some(*sev);
            }
        }
    }

    // Annotated/unannotated partition; `.guardlink/` files never appear in
    // the unannotated list.
    for file in scanned_files {
        if files_with_annotations.contains(&file) {
            model.annotated_files.push(file);
        } else if !file.starts_with(&definitions_prefix) && file != *definitions_dir {
            model.unannotated_files.push(file);
        }
    }

    model.coverage = Coverage::compute(model.annotated_files.len(), model.unannotated_files.len());
    log::info!(
        "assembled model for {}: {} assets, {} threats, {}% coverage",
        model.project,
        model.assets.len(),
        model.threats.len(),
        model.coverage.coverage_percent
    );

    (model, scan_diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardlink_core::{AssetAnnotation, SourceLocation};

    fn loc(file: &str, line: usize) -> SourceLocation {
        SourceLocation::new(file.to_string(), line)
    }

    #[test]
    fn duplicate_asset_id_across_files_emits_one_error_naming_the_first() {
        let a1 = Annotation::Asset(AssetAnnotation {
            location: loc("a.rs", 1),
            path: vec!["Foo".to_string()],
            id: Some("x".to_string()),
            description: None,
        });
        let a2 = Annotation::Asset(AssetAnnotation {
            location: loc("b.rs", 5),
            path: vec!["Foo".to_string()],
            id: Some("x".to_string()),
            description: None,
        });

        let (model, diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string(), "b.rs".to_string()],
            vec![a1, a2],
            Vec::new(),
        );

        assert_eq!(model.assets.len(), 2);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("a.rs:1"));
    }

    #[test]
    fn exposure_inherits_threat_severity_by_sigiled_id() {
        use guardlink_core::{ExposesAnnotation, Severity, ThreatAnnotation};

        let threat = Annotation::Threat(ThreatAnnotation {
            location: loc("a.rs", 1),
            name: "SQLi".to_string(),
            canonical_name: "sqli".to_string(),
            id: Some("sqli".to_string()),
            severity: Some(Severity::Critical),
            external_refs: Vec::new(),
            description: None,
        });
        let exposure = Annotation::Exposes(ExposesAnnotation {
            location: loc("a.rs", 2),
            asset_ref: "App".to_string(),
            threat_ref: "#sqli".to_string(),
            severity: None,
            external_refs: Vec::new(),
            description: None,
        });

        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![threat, exposure],
            Vec::new(),
        );

        assert_eq!(model.exposures[0].severity, Some(Severity::Critical));
    }

    #[test]
    fn exposure_with_non_sigiled_threat_ref_does_not_inherit_severity() {
        use guardlink_core::{ExposesAnnotation, Severity, ThreatAnnotation};

        let threat = Annotation::Threat(ThreatAnnotation {
            location: loc("a.rs", 1),
            name: "SQLi".to_string(),
            canonical_name: "sqli".to_string(),
            id: Some("sqli".to_string()),
            severity: Some(Severity::Critical),
            external_refs: Vec::new(),
            description: None,
        });
        let exposure = Annotation::Exposes(ExposesAnnotation {
            location: loc("a.rs", 2),
            asset_ref: "App".to_string(),
            threat_ref: "sqli".to_string(),
            severity: None,
            external_refs: Vec::new(),
            description: None,
        });

        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![threat, exposure],
            Vec::new(),
        );

        assert_eq!(model.exposures[0].severity, None);
    }

    #[test]
    fn unannotated_files_exclude_definitions_directory() {
        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec![
                "src/main.rs".to_string(),
                ".guardlink/defs.yaml".to_string(),
            ],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(model.unannotated_files, vec!["src/main.rs".to_string()]);
        assert!(model.annotated_files.is_empty());
    }
}
