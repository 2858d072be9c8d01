//! Query Engine (C9, spec §4.9): structured and fuzzy queries over an
//! assembled [`ThreatModel`].

use std::collections::HashSet;

use guardlink_model::ThreatModel;
use serde::Serialize;
use serde_json::{json, Value};

fn strip_hash(s: &str) -> &str {
    s.strip_prefix('#').unwrap_or(s)
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub count: usize,
    pub results: Value,
}

fn response(query: &str, response_type: &str, results: Value) -> QueryResponse {
    let count = match &results {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    };
    QueryResponse {
        query: query.to_string(),
        response_type: response_type.to_string(),
        count,
        results,
    }
}

/// Build the alias set a user-typed reference should match against (spec
/// §4.9 "Reference resolution"): the ref itself, plus any dotted path/id/
/// canonical name it cross-resolves to.
fn build_aliases(model: &ThreatModel, raw_ref: &str) -> HashSet<String> {
    let base = strip_hash(raw_ref).to_lowercase();
    let mut aliases = HashSet::new();
    aliases.insert(base.clone());

    for asset in &model.assets {
        let dotted = asset.path.join(".").to_lowercase();
        if let Some(id) = &asset.id {
            if id.to_lowercase() == base {
                aliases.insert(dotted.clone());
            }
        }
        if dotted == base {
            if let Some(id) = &asset.id {
                aliases.insert(id.to_lowercase());
            }
        }
    }
    for threat in &model.threats {
        if let Some(id) = &threat.id {
            if id.to_lowercase() == base {
                aliases.insert(threat.canonical_name.to_lowercase());
            }
        }
    }
    for control in &model.controls {
        if let Some(id) = &control.id {
            if id.to_lowercase() == base {
                aliases.insert(control.canonical_name.to_lowercase());
            }
        }
    }

    aliases
}

/// Does `stored` (a reference or name as literally recorded in a table)
/// match any alias in the resolved set (spec §4.9 matching rules)?
fn matches(stored: &str, aliases: &HashSet<String>) -> bool {
    let stored_norm = strip_hash(stored).to_lowercase();

    if aliases.contains(&stored_norm) {
        return true;
    }
    if let Some(last) = stored_norm.rsplit('.').next() {
        if aliases.contains(last) {
            return true;
        }
    }
    for alias in aliases {
        if alias.len() >= 3 && (stored_norm.contains(alias.as_str()) || alias.contains(&stored_norm)) {
            return true;
        }
    }
    false
}

fn strip_any_prefix<'a>(original: &'a str, lower: &str, prefixes: &[&str]) -> Option<&'a str> {
    for prefix in prefixes {
        if lower.starts_with(prefix) {
            return Some(original[prefix.len()..].trim());
        }
    }
    None
}

/// Run one query string against an assembled model.
pub fn query(model: &ThreatModel, raw_query: &str) -> QueryResponse {
    let q = raw_query.trim();
    let lower = q.to_lowercase();

    if lower == "unmitigated" {
        let items = guardlink_model::unmitigated_exposures(model);
        return response(q, "unmitigated", json!(items));
    }

    if let Some(r) = strip_any_prefix(q, &lower, &["threats for ", "threats targeting ", "threats on "]) {
        return response(q, "threats", threats_for(model, r));
    }

    if let Some(r) = strip_any_prefix(q, &lower, &["controls for ", "controls protecting ", "controls on "]) {
        return response(q, "controls", controls_for(model, r));
    }

    if let Some(r) = strip_any_prefix(q, &lower, &["flows into ", "flows to "]) {
        return response(q, "flows_into", flows_into(model, r));
    }

    if let Some(r) = strip_any_prefix(q, &lower, &["flows from ", "flows out of "]) {
        return response(q, "flows_from", flows_from(model, r));
    }

    if let Some(r) = strip_any_prefix(
        q,
        &lower,
        &["boundaries for ", "boundaries involving ", "boundaries of ", "boundaries ",
          "boundary for ", "boundary involving ", "boundary of ", "boundary "],
    ) {
        return response(q, "boundaries", boundaries_for(model, r));
    }

    if let Some(r) = strip_any_prefix(q, &lower, &["asset "]) {
        return response(q, "asset", asset_neighborhood(model, r));
    }
    if let Some(r) = strip_any_prefix(q, &lower, &["threat "]) {
        return response(q, "threat", threat_neighborhood(model, r));
    }
    if let Some(r) = strip_any_prefix(q, &lower, &["control "]) {
        return response(q, "control", control_neighborhood(model, r));
    }

    if let Some(r) = strip_any_prefix(q, &lower, &["exposures for ", "exposures on "]) {
        return response(q, "exposures", exposures_for(model, r));
    }
    if let Some(r) = strip_any_prefix(q, &lower, &["mitigations for ", "mitigations on "]) {
        return response(q, "mitigations", mitigations_for(model, r));
    }

    fuzzy(model, q)
}

fn threats_for(model: &ThreatModel, asset_ref: &str) -> Value {
    let aliases = build_aliases(model, asset_ref);
    let mut results = Vec::new();

    for exposure in &model.exposures {
        if !matches(&exposure.asset_ref, &aliases) {
            continue;
        }
        let mitigated = model.mitigations.iter().any(|m| {
            strip_hash(&m.asset_ref).eq_ignore_ascii_case(strip_hash(&exposure.asset_ref))
                && strip_hash(&m.threat_ref).eq_ignore_ascii_case(strip_hash(&exposure.threat_ref))
        });
        let accepted = model.acceptances.iter().any(|a| {
            strip_hash(&a.asset_ref).eq_ignore_ascii_case(strip_hash(&exposure.asset_ref))
                && strip_hash(&a.threat_ref).eq_ignore_ascii_case(strip_hash(&exposure.threat_ref))
        });
        results.push(json!({
            "threat_ref": exposure.threat_ref,
            "asset_ref": exposure.asset_ref,
            "severity": exposure.severity,
            "mitigated": mitigated,
            "accepted": accepted,
        }));
    }

    json!(results)
}

fn controls_for(model: &ThreatModel, asset_ref: &str) -> Value {
    let aliases = build_aliases(model, asset_ref);
    let results: Vec<Value> = model
        .mitigations
        .iter()
        .filter(|m| matches(&m.asset_ref, &aliases) && m.control_ref.is_some())
        .map(|m| {
            json!({
                "control_ref": m.control_ref,
                "asset_ref": m.asset_ref,
                "threat_ref": m.threat_ref,
            })
        })
        .collect();
    json!(results)
}

fn flows_into(model: &ThreatModel, target_ref: &str) -> Value {
    let aliases = build_aliases(model, target_ref);
    let results: Vec<Value> = model
        .flows
        .iter()
        .filter(|f| matches(&f.target, &aliases))
        .map(|f| json!(f))
        .collect();
    json!(results)
}

fn flows_from(model: &ThreatModel, source_ref: &str) -> Value {
    let aliases = build_aliases(model, source_ref);
    let results: Vec<Value> = model
        .flows
        .iter()
        .filter(|f| matches(&f.source, &aliases))
        .map(|f| json!(f))
        .collect();
    json!(results)
}

fn boundaries_for(model: &ThreatModel, asset_ref: &str) -> Value {
    let aliases = build_aliases(model, asset_ref);
    let results: Vec<Value> = model
        .boundaries
        .iter()
        .filter(|b| matches(&b.asset_a, &aliases) || matches(&b.asset_b, &aliases))
        .map(|b| json!(b))
        .collect();
    json!(results)
}

fn exposures_for(model: &ThreatModel, asset_ref: &str) -> Value {
    let aliases = build_aliases(model, asset_ref);
    let results: Vec<Value> = model
        .exposures
        .iter()
        .filter(|e| matches(&e.asset_ref, &aliases))
        .map(|e| json!(e))
        .collect();
    json!(results)
}

fn mitigations_for(model: &ThreatModel, asset_ref: &str) -> Value {
    let aliases = build_aliases(model, asset_ref);
    let results: Vec<Value> = model
        .mitigations
        .iter()
        .filter(|m| matches(&m.asset_ref, &aliases))
        .map(|m| json!(m))
        .collect();
    json!(results)
}

fn asset_neighborhood(model: &ThreatModel, asset_ref: &str) -> Value {
    let aliases = build_aliases(model, asset_ref);
    let Some(asset) = model
        .assets
        .iter()
        .find(|a| a.id.as_deref().map(|id| matches(id, &aliases)).unwrap_or(false) || matches(&a.path.join("."), &aliases))
    else {
        return json!([]);
    };

    json!([{
        "asset": asset,
        "exposures": exposures_for(model, asset_ref),
        "mitigations": mitigations_for(model, asset_ref),
        "flows_into": flows_into(model, asset_ref),
        "flows_from": flows_from(model, asset_ref),
        "boundaries": boundaries_for(model, asset_ref),
    }])
}

fn threat_neighborhood(model: &ThreatModel, threat_ref: &str) -> Value {
    let aliases = build_aliases(model, threat_ref);
    let Some(threat) = model.threats.iter().find(|t| {
        t.id.as_deref().map(|id| matches(id, &aliases)).unwrap_or(false)
            || matches(&t.canonical_name, &aliases)
    }) else {
        return json!([]);
    };

    let exposures: Vec<Value> = model
        .exposures
        .iter()
        .filter(|e| matches(&e.threat_ref, &aliases))
        .map(|e| json!(e))
        .collect();
    let mitigations: Vec<Value> = model
        .mitigations
        .iter()
        .filter(|m| matches(&m.threat_ref, &aliases))
        .map(|m| json!(m))
        .collect();

    json!([{
        "threat": threat,
        "exposures": exposures,
        "mitigations": mitigations,
    }])
}

fn control_neighborhood(model: &ThreatModel, control_ref: &str) -> Value {
    let aliases = build_aliases(model, control_ref);
    let Some(control) = model.controls.iter().find(|c| {
        c.id.as_deref().map(|id| matches(id, &aliases)).unwrap_or(false)
            || matches(&c.canonical_name, &aliases)
    }) else {
        return json!([]);
    };

    let mitigations: Vec<Value> = model
        .mitigations
        .iter()
        .filter(|m| m.control_ref.as_deref().map(|c| matches(c, &aliases)).unwrap_or(false))
        .map(|m| json!(m))
        .collect();
    let validations: Vec<Value> = model
        .validations
        .iter()
        .filter(|v| matches(&v.control_ref, &aliases))
        .map(|v| json!(v))
        .collect();

    json!([{
        "control": control,
        "mitigations": mitigations,
        "validations": validations,
    }])
}

fn fuzzy(model: &ThreatModel, q: &str) -> QueryResponse {
    let aliases = build_aliases(model, q);
    let mut results = Vec::new();

    for asset in &model.assets {
        let dotted = asset.path.join(".");
        if asset.id.as_deref().map(|id| matches(id, &aliases)).unwrap_or(false) || matches(&dotted, &aliases) {
            results.push(json!({"kind": "asset", "record": asset}));
        }
    }
    for threat in &model.threats {
        if threat.id.as_deref().map(|id| matches(id, &aliases)).unwrap_or(false)
            || matches(&threat.canonical_name, &aliases)
        {
            results.push(json!({"kind": "threat", "record": threat}));
        }
    }
    for control in &model.controls {
        if control.id.as_deref().map(|id| matches(id, &aliases)).unwrap_or(false)
            || matches(&control.canonical_name, &aliases)
        {
            results.push(json!({"kind": "control", "record": control}));
        }
    }

    if results.is_empty() {
        return response(
            q,
            "no_match",
            json!([format!(
                "no asset, threat, or control matched '{}'; try a sigiled id (#name), a dotted asset path, or a threat/control name",
                q
            )]),
        );
    }

    response(q, "mixed", json!(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardlink_core::{Annotation, AssetAnnotation, FlowsAnnotation, SourceLocation};
    use guardlink_model::assemble;

    fn loc(file: &str, line: usize) -> SourceLocation {
        SourceLocation::new(file.to_string(), line)
    }

    fn sample_model() -> ThreatModel {
        let frontend = Annotation::Asset(AssetAnnotation {
            location: loc("a.rs", 1),
            path: vec!["App".to_string(), "Frontend".to_string()],
            id: None,
            description: None,
        });
        let api = Annotation::Asset(AssetAnnotation {
            location: loc("a.rs", 2),
            path: vec!["App".to_string(), "API".to_string()],
            id: None,
            description: None,
        });
        let flow = Annotation::Flows(FlowsAnnotation {
            location: loc("a.rs", 3),
            source: "App.Frontend".to_string(),
            target: "App.API".to_string(),
            mechanism: Some("HTTPS".to_string()),
            description: None,
        });

        assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![frontend, api, flow],
            Vec::new(),
        )
        .0
    }

    #[test]
    fn flows_into_returns_matching_flow() {
        let model = sample_model();
        let resp = query(&model, "flows into App.API");
        assert_eq!(resp.response_type, "flows_into");
        assert_eq!(resp.count, 1);
    }

    #[test]
    fn unmitigated_respects_hash_normalization() {
        use guardlink_core::{AcceptsAnnotation, ExposesAnnotation};

        let expose = Annotation::Exposes(ExposesAnnotation {
            location: loc("a.rs", 1),
            asset_ref: "#app".to_string(),
            threat_ref: "#xss".to_string(),
            severity: None,
            external_refs: Vec::new(),
            description: None,
        });
        let accept = Annotation::Accepts(AcceptsAnnotation {
            location: loc("a.rs", 2),
            threat_ref: "xss".to_string(),
            asset_ref: "app".to_string(),
            description: None,
        });

        let (model, _diags) = assemble(
            "proj",
            ".guardlink",
            vec!["a.rs".to_string()],
            vec![expose, accept],
            Vec::new(),
        );

        let resp = query(&model, "unmitigated");
        assert_eq!(resp.count, 0);
    }

    #[test]
    fn no_match_returns_hint() {
        let model = sample_model();
        let resp = query(&model, "nonexistent_thing_xyz");
        assert_eq!(resp.response_type, "no_match");
    }
}
