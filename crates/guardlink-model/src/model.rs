//! The `ThreatModel` aggregate (spec §3.1, §6.2).
//!
//! Field declaration order is the canonical serialization order; `serde_json`
//! preserves struct field order for non-map types, so no `#[serde(rename)]`
//! games are needed to keep the on-disk form stable.

use serde::{Deserialize, Serialize};

use guardlink_core::{
    AcceptsAnnotation, AssetAnnotation, AssumesAnnotation, AuditAnnotation, BoundaryAnnotation,
    CommentAnnotation, ControlAnnotation, ExposesAnnotation, FlowsAnnotation, HandlesAnnotation,
    MitigatesAnnotation, OwnsAnnotation, ShieldMarker, ThreatAnnotation, TransfersAnnotation,
    ValidatesAnnotation,
};

/// Fixed schema version for this specification (spec §6.2).
pub const SCHEMA_VERSION: &str = "1.1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub total_files: usize,
    pub annotated_files: usize,
    pub coverage_percent: u32,
}

impl Coverage {
    pub fn compute(annotated: usize, unannotated: usize) -> Self {
        let total = annotated + unannotated;
        let percent = if total == 0 {
            0
        } else {
            ((annotated as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            total_files: total,
            annotated_files: annotated,
            coverage_percent: percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatModel {
    pub version: String,
    pub project: String,
    pub generated_at: String,
    pub source_files: usize,
    pub annotations_parsed: usize,
    pub annotated_files: Vec<String>,
    pub unannotated_files: Vec<String>,

    pub assets: Vec<AssetAnnotation>,
    pub threats: Vec<ThreatAnnotation>,
    pub controls: Vec<ControlAnnotation>,

    pub mitigations: Vec<MitigatesAnnotation>,
    pub exposures: Vec<ExposesAnnotation>,
    pub acceptances: Vec<AcceptsAnnotation>,
    pub transfers: Vec<TransfersAnnotation>,

    pub flows: Vec<FlowsAnnotation>,
    pub boundaries: Vec<BoundaryAnnotation>,

    pub validations: Vec<ValidatesAnnotation>,
    pub audits: Vec<AuditAnnotation>,
    pub ownership: Vec<OwnsAnnotation>,
    pub data_handling: Vec<HandlesAnnotation>,
    pub assumptions: Vec<AssumesAnnotation>,
    pub shields: Vec<ShieldMarker>,
    pub comments: Vec<CommentAnnotation>,

    pub coverage: Coverage,
}
