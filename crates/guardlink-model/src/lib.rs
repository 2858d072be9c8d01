//! The `ThreatModel` aggregate, its assembler, validator, and canonical
//! serialization form (spec §3.1, §4.7, §4.8, §4.11).

pub mod assembler;
pub mod model;
pub mod refs;
pub mod validator;

pub use assembler::assemble;
pub use model::{Coverage, ThreatModel, SCHEMA_VERSION};
pub use validator::{
    dangling_refs, unmitigated_exposures, validate, UnmitigatedExposure, ValidationReport,
};
