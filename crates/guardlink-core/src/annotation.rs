//! GAL annotation and diagnostic types.
//!
//! `Annotation` is a closed tagged union over the GAL verb set (spec §4.4):
//! every variant carries a [`SourceLocation`] and a verb-specific payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an annotation (or a diagnostic) was found in the project tree.
///
/// `file` is always relative to the scan root, forward-slash separated,
/// regardless of host filesystem (spec §4.6, property P7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_symbol: Option<String>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            end_line: None,
            parent_symbol: None,
        }
    }
}

/// Severity levels, with P0-P3 as aliases (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity token, accepting both the word form and the P0-P3 alias,
    /// case-insensitively.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "critical" | "p0" => Some(Severity::Critical),
            "high" | "p1" => Some(Severity::High),
            "medium" | "p2" => Some(Severity::Medium),
            "low" | "p3" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// Data classification tags for `@handles` (spec §6.3), stored lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataClassification {
    Pii,
    Phi,
    Financial,
    Secrets,
    Internal,
    Public,
}

impl DataClassification {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "pii" => Some(Self::Pii),
            "phi" => Some(Self::Phi),
            "financial" => Some(Self::Financial),
            "secrets" => Some(Self::Secrets),
            "internal" => Some(Self::Internal),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

impl fmt::Display for DataClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pii => "pii",
            Self::Phi => "phi",
            Self::Financial => "financial",
            Self::Secrets => "secrets",
            Self::Internal => "internal",
            Self::Public => "public",
        };
        write!(f, "{}", s)
    }
}

/// Diagnostic severity level (spec §6.4). Distinct from [`Severity`], which
/// describes a threat's risk level rather than a parse/model health signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// A single diagnostic emitted by the scanner, parser, or validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Diagnostic {
    pub fn error(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            file: file.into(),
            line,
            raw: None,
        }
    }

    pub fn warning(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            file: file.into(),
            line,
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

macro_rules! annotation_struct {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub location: SourceLocation,
            $(pub $field: $ty,)*
            #[serde(skip_serializing_if = "Option::is_none")]
            pub description: Option<String>,
        }
    };
}

annotation_struct!(AssetAnnotation {
    path: Vec<String>,
    id: Option<String>,
});

annotation_struct!(ThreatAnnotation {
    name: String,
    canonical_name: String,
    id: Option<String>,
    severity: Option<Severity>,
    external_refs: Vec<String>,
});

annotation_struct!(ControlAnnotation {
    name: String,
    canonical_name: String,
    id: Option<String>,
});

annotation_struct!(MitigatesAnnotation {
    asset_ref: String,
    threat_ref: String,
    control_ref: Option<String>,
});

annotation_struct!(ExposesAnnotation {
    asset_ref: String,
    threat_ref: String,
    severity: Option<Severity>,
    external_refs: Vec<String>,
});

annotation_struct!(AcceptsAnnotation {
    threat_ref: String,
    asset_ref: String,
});

annotation_struct!(TransfersAnnotation {
    threat_ref: String,
    from_asset: String,
    to_asset: String,
});

annotation_struct!(FlowsAnnotation {
    source: String,
    target: String,
    mechanism: Option<String>,
});

annotation_struct!(BoundaryAnnotation {
    asset_a: String,
    asset_b: String,
    id: Option<String>,
});

annotation_struct!(ValidatesAnnotation {
    control_ref: String,
    asset_ref: String,
});

annotation_struct!(AuditAnnotation { asset_ref: String });

annotation_struct!(OwnsAnnotation {
    owner: String,
    asset_ref: String,
});

annotation_struct!(HandlesAnnotation {
    classification: DataClassification,
    asset_ref: String,
});

annotation_struct!(AssumesAnnotation { asset_ref: String });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAnnotation {
    pub location: SourceLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShieldMarker {
    pub location: SourceLocation,
}

/// The closed GAL verb set, tagged by variant (spec §9: "tagged unions over
/// inheritance").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb")]
pub enum Annotation {
    Asset(AssetAnnotation),
    Threat(ThreatAnnotation),
    Control(ControlAnnotation),
    Mitigates(MitigatesAnnotation),
    Exposes(ExposesAnnotation),
    Accepts(AcceptsAnnotation),
    Transfers(TransfersAnnotation),
    Flows(FlowsAnnotation),
    Boundary(BoundaryAnnotation),
    Validates(ValidatesAnnotation),
    Audit(AuditAnnotation),
    Owns(OwnsAnnotation),
    Handles(HandlesAnnotation),
    Assumes(AssumesAnnotation),
    Comment(CommentAnnotation),
    ShieldBegin(ShieldMarker),
    ShieldEnd(ShieldMarker),
}

impl Annotation {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Annotation::Asset(a) => &a.location,
            Annotation::Threat(a) => &a.location,
            Annotation::Control(a) => &a.location,
            Annotation::Mitigates(a) => &a.location,
            Annotation::Exposes(a) => &a.location,
            Annotation::Accepts(a) => &a.location,
            Annotation::Transfers(a) => &a.location,
            Annotation::Flows(a) => &a.location,
            Annotation::Boundary(a) => &a.location,
            Annotation::Validates(a) => &a.location,
            Annotation::Audit(a) => &a.location,
            Annotation::Owns(a) => &a.location,
            Annotation::Handles(a) => &a.location,
            Annotation::Assumes(a) => &a.location,
            Annotation::Comment(a) => &a.location,
            Annotation::ShieldBegin(a) => &a.location,
            Annotation::ShieldEnd(a) => &a.location,
        }
    }

    /// Append continuation text to this annotation's description, joined by
    /// a single space (spec §4.5). No-op for shield markers, which carry no
    /// description.
    pub fn append_description(&mut self, text: &str) {
        let slot = match self {
            Annotation::Asset(a) => &mut a.description,
            Annotation::Threat(a) => &mut a.description,
            Annotation::Control(a) => &mut a.description,
            Annotation::Mitigates(a) => &mut a.description,
            Annotation::Exposes(a) => &mut a.description,
            Annotation::Accepts(a) => &mut a.description,
            Annotation::Transfers(a) => &mut a.description,
            Annotation::Flows(a) => &mut a.description,
            Annotation::Boundary(a) => &mut a.description,
            Annotation::Validates(a) => &mut a.description,
            Annotation::Audit(a) => &mut a.description,
            Annotation::Owns(a) => &mut a.description,
            Annotation::Handles(a) => &mut a.description,
            Annotation::Assumes(a) => &mut a.description,
            Annotation::Comment(a) => &mut a.description,
            Annotation::ShieldBegin(_) | Annotation::ShieldEnd(_) => return,
        };
        match slot {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(text);
            }
            None => *slot = Some(text.to_string()),
        }
    }
}
