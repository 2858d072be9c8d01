//! Diff Engine (C10, spec §4.10): compare two `ThreatModel` values by stable
//! identity key, producing categorized changes and a risk delta.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use guardlink_core::{
    AcceptsAnnotation, AssetAnnotation, BoundaryAnnotation, ControlAnnotation, ExposesAnnotation,
    FlowsAnnotation, MitigatesAnnotation, ThreatAnnotation, TransfersAnnotation,
};
use guardlink_model::{unmitigated_exposures, ThreatModel};
use serde::Serialize;

fn strip_hash(s: &str) -> &str {
    s.strip_prefix('#').unwrap_or(s)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modification<T> {
    pub before: T,
    pub after: T,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDiff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub modified: Vec<Modification<T>>,
}

impl<T> TableDiff<T> {
    fn totals(&self) -> (usize, usize, usize) {
        (self.added.len(), self.removed.len(), self.modified.len())
    }
}

fn diff_table<T, K, KeyFn, DetailFn>(
    before: &[T],
    after: &[T],
    key_fn: KeyFn,
    detail_fn: DetailFn,
) -> TableDiff<T>
where
    T: Clone,
    K: Eq + Hash,
    KeyFn: Fn(&T) -> K,
    DetailFn: Fn(&T, &T) -> Option<String>,
{
    let before_map: HashMap<K, &T> = before.iter().map(|item| (key_fn(item), item)).collect();
    let after_map: HashMap<K, &T> = after.iter().map(|item| (key_fn(item), item)).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for item in after {
        let key = key_fn(item);
        match before_map.get(&key) {
            None => added.push(item.clone()),
            Some(prior) => {
                if let Some(details) = detail_fn(prior, item) {
                    modified.push(Modification {
                        before: (*prior).clone(),
                        after: item.clone(),
                        details,
                    });
                }
            }
        }
    }

    let mut removed = Vec::new();
    for item in before {
        let key = key_fn(item);
        if !after_map.contains_key(&key) {
            removed.push(item.clone());
        }
    }

    TableDiff { added, removed, modified }
}

fn no_detail<T>(_before: &T, _after: &T) -> Option<String> {
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiffTotals {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub assets: TableDiff<AssetAnnotation>,
    pub threats: TableDiff<ThreatAnnotation>,
    pub controls: TableDiff<ControlAnnotation>,
    pub mitigations: TableDiff<MitigatesAnnotation>,
    pub exposures: TableDiff<ExposesAnnotation>,
    pub acceptances: TableDiff<AcceptsAnnotation>,
    pub transfers: TableDiff<TransfersAnnotation>,
    pub flows: TableDiff<FlowsAnnotation>,
    pub boundaries: TableDiff<BoundaryAnnotation>,
    pub new_unmitigated: usize,
    pub resolved_unmitigated: usize,
    pub risk_delta: String,
    pub totals: DiffTotals,
}

fn asset_key(a: &AssetAnnotation) -> String {
    a.id.clone().unwrap_or_else(|| a.path.join("."))
}

fn threat_key(t: &ThreatAnnotation) -> String {
    t.id.clone().unwrap_or_else(|| t.canonical_name.clone())
}

fn control_key(c: &ControlAnnotation) -> String {
    c.id.clone().unwrap_or_else(|| c.canonical_name.clone())
}

fn mitigation_key(m: &MitigatesAnnotation) -> String {
    format!(
        "{}::{}::{}",
        m.asset_ref,
        m.threat_ref,
        m.control_ref.as_deref().unwrap_or("")
    )
}

fn exposure_key(e: &ExposesAnnotation) -> String {
    format!("{}::{}", e.asset_ref, e.threat_ref)
}

fn acceptance_key(a: &AcceptsAnnotation) -> String {
    format!("{}::{}", a.asset_ref, a.threat_ref)
}

fn flow_key(f: &FlowsAnnotation) -> String {
    format!("{}->{}::{}", f.source, f.target, f.mechanism.as_deref().unwrap_or(""))
}

fn boundary_key(b: &BoundaryAnnotation) -> String {
    b.id.clone().unwrap_or_else(|| format!("{}::{}", b.asset_a, b.asset_b))
}

fn transfer_key(t: &TransfersAnnotation) -> String {
    format!("{}->{}::{}", t.from_asset, t.to_asset, t.threat_ref)
}

fn asset_detail(a: &AssetAnnotation, b: &AssetAnnotation) -> Option<String> {
    let mut changes = Vec::new();
    if a.description != b.description {
        changes.push("description changed");
    }
    if a.path != b.path {
        changes.push("path changed");
    }
    if changes.is_empty() { None } else { Some(changes.join(", ")) }
}

fn threat_detail(a: &ThreatAnnotation, b: &ThreatAnnotation) -> Option<String> {
    let mut changes = Vec::new();
    if a.severity != b.severity {
        changes.push("severity changed");
    }
    if a.description != b.description {
        changes.push("description changed");
    }
    if a.external_refs != b.external_refs {
        changes.push("external refs changed");
    }
    if changes.is_empty() { None } else { Some(changes.join(", ")) }
}

fn control_detail(a: &ControlAnnotation, b: &ControlAnnotation) -> Option<String> {
    if a.description != b.description {
        Some("description changed".to_string())
    } else {
        None
    }
}

fn exposure_detail(a: &ExposesAnnotation, b: &ExposesAnnotation) -> Option<String> {
    let mut changes = Vec::new();
    if a.severity != b.severity {
        changes.push("severity changed");
    }
    if a.description != b.description {
        changes.push("description changed");
    }
    if changes.is_empty() { None } else { Some(changes.join(", ")) }
}

fn flow_detail(a: &FlowsAnnotation, b: &FlowsAnnotation) -> Option<String> {
    let mut changes = Vec::new();
    if a.mechanism != b.mechanism {
        changes.push("mechanism changed");
    }
    if a.description != b.description {
        changes.push("description changed");
    }
    if changes.is_empty() { None } else { Some(changes.join(", ")) }
}

/// Compare two models by stable identity key (spec §4.10).
pub fn diff(before: &ThreatModel, after: &ThreatModel) -> DiffReport {
    let assets = diff_table(&before.assets, &after.assets, asset_key, asset_detail);
    let threats = diff_table(&before.threats, &after.threats, threat_key, threat_detail);
    let controls = diff_table(&before.controls, &after.controls, control_key, control_detail);
    let mitigations = diff_table(&before.mitigations, &after.mitigations, mitigation_key, no_detail);
    let exposures = diff_table(&before.exposures, &after.exposures, exposure_key, exposure_detail);
    let acceptances = diff_table(&before.acceptances, &after.acceptances, acceptance_key, no_detail);
    let transfers = diff_table(&before.transfers, &after.transfers, transfer_key, no_detail);
    let flows = diff_table(&before.flows, &after.flows, flow_key, flow_detail);
    let boundaries = diff_table(&before.boundaries, &after.boundaries, boundary_key, no_detail);

    let before_unmitigated: HashSet<(String, String)> = unmitigated_exposures(before)
        .iter()
        .map(|e| (strip_hash(&e.asset_ref).to_string(), strip_hash(&e.threat_ref).to_string()))
        .collect();
    let after_unmitigated: HashSet<(String, String)> = unmitigated_exposures(after)
        .iter()
        .map(|e| (strip_hash(&e.asset_ref).to_string(), strip_hash(&e.threat_ref).to_string()))
        .collect();

    let new_unmitigated = after_unmitigated.difference(&before_unmitigated).count();
    let resolved_unmitigated = before_unmitigated.difference(&after_unmitigated).count();
    let risk_delta = if new_unmitigated > resolved_unmitigated {
        "increased"
    } else if new_unmitigated < resolved_unmitigated {
        "decreased"
    } else {
        "unchanged"
    }
    .to_string();

    let tables: [(usize, usize, usize); 9] = [
        assets.totals(),
        threats.totals(),
        controls.totals(),
        mitigations.totals(),
        exposures.totals(),
        acceptances.totals(),
        transfers.totals(),
        flows.totals(),
        boundaries.totals(),
    ];
    let totals = tables.iter().fold(
        DiffTotals { added: 0, removed: 0, modified: 0 },
        |acc, (a, r, m)| DiffTotals {
            added: acc.added + a,
            removed: acc.removed + r,
            modified: acc.modified + m,
        },
    );

    DiffReport {
        assets,
        threats,
        controls,
        mitigations,
        exposures,
        acceptances,
        transfers,
        flows,
        boundaries,
        new_unmitigated,
        resolved_unmitigated,
        risk_delta,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardlink_core::{Annotation, ExposesAnnotation, MitigatesAnnotation, SourceLocation};
    use guardlink_model::assemble;

    fn loc(file: &str, line: usize) -> SourceLocation {
        SourceLocation::new(file.to_string(), line)
    }

    #[test]
    fn mitigating_an_exposure_decreases_risk() {
        let expose = Annotation::Exposes(ExposesAnnotation {
            location: loc("a.rs", 1),
            asset_ref: "App".to_string(),
            threat_ref: "#xss".to_string(),
            severity: None,
            external_refs: Vec::new(),
            description: None,
        });
        let (before, _) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![expose.clone()],
            Vec::new(),
        );

        let mitigate = Annotation::Mitigates(MitigatesAnnotation {
            location: loc("a.rs", 2),
            asset_ref: "App".to_string(),
            threat_ref: "#xss".to_string(),
            control_ref: None,
            description: None,
        });
        let (after, _) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![expose, mitigate],
            Vec::new(),
        );

        let report = diff(&before, &after);
        assert_eq!(report.risk_delta, "decreased");
        assert_eq!(report.resolved_unmitigated, 1);
        assert_eq!(report.new_unmitigated, 0);
    }

    #[test]
    fn diff_is_symmetric_with_swapped_added_removed() {
        let a1 = Annotation::Asset(guardlink_core::AssetAnnotation {
            location: loc("a.rs", 1),
            path: vec!["Foo".to_string()],
            id: Some("f".to_string()),
            description: None,
        });
        let (before, _) = assemble("proj", ".guardlink", vec!["a.rs".to_string()], vec![], Vec::new());
        let (after, _) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![a1],
            Vec::new(),
        );

        let forward = diff(&before, &after);
        let backward = diff(&after, &before);

        assert_eq!(forward.assets.added.len(), backward.assets.removed.len());
        assert_eq!(forward.assets.removed.len(), backward.assets.added.len());
    }
}
