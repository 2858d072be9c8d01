//! Scanning layer: per-file GAL parsing (C5) and project-wide directory
//! traversal (C6). Owns all filesystem I/O for the toolchain.

pub mod file_parser;
pub mod project_scanner;

pub use file_parser::parse_file;
pub use project_scanner::{
    scan_project, CancelFlag, ScanConfig, ScanResult, DEFAULT_EXCLUDE_DIRS,
    DEFAULT_INCLUDE_EXTENSIONS,
};
