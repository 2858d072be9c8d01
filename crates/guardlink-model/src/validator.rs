//! Validator (C8, spec §4.8): duplicate ids, dangling references, unmitigated
//! exposures, and coverage — all recomputed directly from an assembled
//! model, so validation works standalone against a model loaded from disk.

use std::collections::{HashMap, HashSet};

use guardlink_core::{Diagnostic, SourceLocation};
use serde::{Deserialize, Serialize};

use crate::model::ThreatModel;
use crate::refs::{is_sigiled, strip_hash};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmitigatedExposure {
    pub asset_ref: String,
    pub threat_ref: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub unmitigated: Vec<UnmitigatedExposure>,
    pub coverage_percent: u32,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == guardlink_core::DiagnosticLevel::Error)
    }
}

pub fn validate(model: &ThreatModel) -> ValidationReport {
    let mut diagnostics = Vec::new();

    diagnostics.extend(duplicate_ids(model));
    diagnostics.extend(dangling_refs(model));

    let unmitigated = unmitigated_exposures(model);
    log::info!(
        "validated {}: {} diagnostics, {} unmitigated exposures",
        model.project,
        diagnostics.len(),
        unmitigated.len()
    );

    ValidationReport {
        diagnostics,
        unmitigated,
        coverage_percent: model.coverage.coverage_percent,
    }
}

fn duplicate_ids(model: &ThreatModel) -> Vec<Diagnostic> {
    let mut seen: HashMap<&str, &SourceLocation> = HashMap::new();
    let mut diagnostics = Vec::new();

    let entries: Vec<(&str, &SourceLocation)> = model
        .assets
        .iter()
        .filter_map(|a| a.id.as_deref().map(|id| (id, &a.location)))
        .chain(
            model
                .threats
                .iter()
                .filter_map(|t| t.id.as_deref().map(|id| (id, &t.location))),
        )
        .chain(
            model
                .controls
                .iter()
                .filter_map(|c| c.id.as_deref().map(|id| (id, &c.location))),
        )
        .chain(
            model
                .boundaries
                .iter()
                .filter_map(|b| b.id.as_deref().map(|id| (id, &b.location))),
        )
        .collect();

    for (id, location) in entries {
        match seen.get(id) {
            Some(first) => diagnostics.push(Diagnostic::error(
                location.file.clone(),
                location.line,
                format!(
                    "duplicate id #{}: already defined at {}:{}",
                    id, first.file, first.line
                ),
            )),
            None => {
                seen.insert(id, location);
            }
        }
    }

    diagnostics
}

/// Every sigiled id declared by the model, for dangling-reference checks.
fn declared_ids(model: &ThreatModel) -> HashSet<&str> {
    model
        .assets
        .iter()
        .filter_map(|a| a.id.as_deref())
        .chain(model.threats.iter().filter_map(|t| t.id.as_deref()))
        .chain(model.controls.iter().filter_map(|c| c.id.as_deref()))
        .chain(model.boundaries.iter().filter_map(|b| b.id.as_deref()))
        .collect()
}

pub fn dangling_refs(model: &ThreatModel) -> Vec<Diagnostic> {
    let ids = declared_ids(model);
    let mut diagnostics = Vec::new();

    let mut check = |reference: &str, location: &SourceLocation| {
        if !is_sigiled(reference) {
            return;
        }
        let id = strip_hash(reference);
        if !ids.contains(id) {
            diagnostics.push(Diagnostic::warning(
                location.file.clone(),
                location.line,
                format!("Dangling reference: #{} is never defined", id),
            ));
        }
    };

    for m in &model.mitigations {
        check(&m.asset_ref, &m.location);
        check(&m.threat_ref, &m.location);
        if let Some(control_ref) = &m.control_ref {
            check(control_ref, &m.location);
        }
    }
    for e in &model.exposures {
        check(&e.asset_ref, &e.location);
        check(&e.threat_ref, &e.location);
    }
    for a in &model.acceptances {
        check(&a.asset_ref, &a.location);
        check(&a.threat_ref, &a.location);
    }
    for t in &model.transfers {
        check(&t.from_asset, &t.location);
        check(&t.to_asset, &t.location);
        check(&t.threat_ref, &t.location);
    }
    for f in &model.flows {
        check(&f.source, &f.location);
        check(&f.target, &f.location);
    }
    for b in &model.boundaries {
        check(&b.asset_a, &b.location);
        check(&b.asset_b, &b.location);
    }
    for v in &model.validations {
        check(&v.control_ref, &v.location);
        check(&v.asset_ref, &v.location);
    }
    for a in &model.audits {
        check(&a.asset_ref, &a.location);
    }
    for o in &model.ownership {
        check(&o.asset_ref, &o.location);
    }
    for h in &model.data_handling {
        check(&h.asset_ref, &h.location);
    }
    for a in &model.assumptions {
        check(&a.asset_ref, &a.location);
    }

    diagnostics
}

/// An exposure is unmitigated iff no mitigation or acceptance names the same
/// (asset, threat) pair after reference normalization (spec §4.8 rule 3).
pub fn unmitigated_exposures(model: &ThreatModel) -> Vec<UnmitigatedExposure> {
    let mut resolved: HashSet<(String, String)> = HashSet::new();

    for m in &model.mitigations {
        resolved.insert((strip_hash(&m.asset_ref).to_string(), strip_hash(&m.threat_ref).to_string()));
    }
    for a in &model.acceptances {
        resolved.insert((strip_hash(&a.asset_ref).to_string(), strip_hash(&a.threat_ref).to_string()));
    }

    model
        .exposures
        .iter()
        .filter(|e| {
            !resolved.contains(&(
                strip_hash(&e.asset_ref).to_string(),
                strip_hash(&e.threat_ref).to_string(),
            ))
        })
        .map(|e| UnmitigatedExposure {
            asset_ref: e.asset_ref.clone(),
            threat_ref: e.threat_ref.clone(),
            location: e.location.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use guardlink_core::{
        AcceptsAnnotation, Annotation, AssetAnnotation, ExposesAnnotation, MitigatesAnnotation,
        SourceLocation, ThreatAnnotation,
    };

    fn loc(file: &str, line: usize) -> SourceLocation {
        SourceLocation::new(file.to_string(), line)
    }

    #[test]
    fn dangling_mitigates_reference_emits_one_warning() {
        let mitigates = Annotation::Mitigates(MitigatesAnnotation {
            location: loc("a.rs", 1),
            asset_ref: "App".to_string(),
            threat_ref: "#sqli".to_string(),
            control_ref: None,
            description: None,
        });

        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![mitigates],
            Vec::new(),
        );

        let report = validate(&model);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("#sqli"));
        assert_eq!(
            report.diagnostics[0].level,
            guardlink_core::DiagnosticLevel::Warning
        );
    }

    #[test]
    fn unmitigated_normalizes_hash_prefix_on_either_side() {
        let expose = Annotation::Exposes(ExposesAnnotation {
            location: loc("a.rs", 1),
            asset_ref: "app".to_string(),
            threat_ref: "#xss".to_string(),
            severity: None,
            external_refs: Vec::new(),
            description: None,
        });
        let accept = Annotation::Accepts(AcceptsAnnotation {
            location: loc("a.rs", 2),
            threat_ref: "xss".to_string(),
            asset_ref: "#app".to_string(),
            description: None,
        });

        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![expose, accept],
            Vec::new(),
        );

        assert!(unmitigated_exposures(&model).is_empty());
    }

    #[test]
    fn duplicate_ids_are_surfaced_from_the_model_alone() {
        let a1 = AssetAnnotation {
            location: loc("a.rs", 1),
            path: vec!["Foo".to_string()],
            id: Some("x".to_string()),
            description: None,
        };
        let a2 = AssetAnnotation {
            location: loc("b.rs", 2),
            path: vec!["Bar".to_string()],
            id: Some("x".to_string()),
            description: None,
        };
        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string(), "b.rs".to_string()],
            vec![Annotation::Asset(a1), Annotation::Asset(a2)],
            Vec::new(),
        );

        let report = validate(&model);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn no_unmitigated_threat_definition_is_not_dangling_by_itself() {
        let threat = Annotation::Threat(ThreatAnnotation {
            location: loc("a.rs", 1),
            name: "SQLi".to_string(),
            canonical_name: "sqli".to_string(),
            id: Some("sqli".to_string()),
            severity: None,
            external_refs: Vec::new(),
            description: None,
        });
        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![threat],
            Vec::new(),
        );
        assert!(validate(&model).diagnostics.is_empty());
    }
}
