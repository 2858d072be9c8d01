//! Ambient configuration: an optional `guardlink.toml` at the scan root,
//! overridable field-by-field by CLI flags (SPEC_FULL.md §4.12).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use guardlink_scanner::{ScanConfig, DEFAULT_EXCLUDE_DIRS, DEFAULT_INCLUDE_EXTENSIONS};
use serde::Deserialize;

const DEFAULT_DEFINITIONS_DIR: &str = ".guardlink";
const DEFAULT_MAX_FILE_BYTES: u64 = 1_048_576;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    include_globs: Option<Vec<String>>,
    exclude_dirs: Option<Vec<String>>,
    definitions_dir: Option<String>,
    max_file_bytes: Option<u64>,
    project_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GuardlinkConfig {
    pub include_globs: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub definitions_dir: String,
    pub max_file_bytes: u64,
    pub project_name: Option<String>,
}

impl Default for GuardlinkConfig {
    fn default() -> Self {
        Self {
            include_globs: DEFAULT_INCLUDE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            definitions_dir: DEFAULT_DEFINITIONS_DIR.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            project_name: None,
        }
    }
}

impl GuardlinkConfig {
    /// Load `<root>/guardlink.toml` if present; a missing file is not an
    /// error, defaults apply.
    pub fn load(root: &Path, explicit_path: Option<&Path>) -> Result<Self> {
        let candidate = explicit_path.map(Path::to_path_buf).unwrap_or_else(|| root.join("guardlink.toml"));

        let mut config = Self::default();
        if candidate.exists() {
            let text = fs::read_to_string(&candidate)
                .with_context(|| format!("could not read config file: {}", candidate.display()))?;
            let raw: RawConfig = toml::from_str(&text)
                .with_context(|| format!("invalid config file: {}", candidate.display()))?;

            if let Some(include) = raw.include_globs {
                config.include_globs = include;
            }
            if let Some(exclude) = raw.exclude_dirs {
                config.exclude_dirs = exclude;
            }
            if let Some(dir) = raw.definitions_dir {
                config.definitions_dir = dir;
            }
            if let Some(max) = raw.max_file_bytes {
                config.max_file_bytes = max;
            }
            if raw.project_name.is_some() {
                config.project_name = raw.project_name;
            }
        }

        if config.project_name.is_none() {
            config.project_name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string());
        }

        Ok(config)
    }

    /// Apply CLI flag overrides (non-empty `--include`/`--exclude` replace
    /// the config-file lists entirely, per SPEC_FULL.md §4.12).
    pub fn with_cli_overrides(mut self, include: &[String], exclude: &[String]) -> Self {
        if !include.is_empty() {
            self.include_globs = include.to_vec();
        }
        if !exclude.is_empty() {
            self.exclude_dirs = exclude.to_vec();
        }
        self
    }

    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig {
            include_extensions: self.include_globs.iter().cloned().collect(),
            exclude_dirs: self.exclude_dirs.iter().cloned().collect(),
            definitions_dir: self.definitions_dir.clone(),
            max_file_bytes: self.max_file_bytes,
        }
    }

    pub fn project_label(&self) -> String {
        self.project_name.clone().unwrap_or_else(|| "project".to_string())
    }
}
