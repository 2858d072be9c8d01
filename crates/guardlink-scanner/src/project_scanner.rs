//! Project Scanner (spec §4.6): enumerate source files under a root
//! directory and drive the file parser over each one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use guardlink_core::{Annotation, Diagnostic};

use crate::file_parser::parse_file;

/// Source file extensions recognized by the scanner (spec §6.3, closed set).
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "py", "rb", "go", "rs", "java", "kt", "scala", "c", "cpp", "cc",
    "h", "hpp", "cs", "swift", "dart", "sql", "lua", "hs", "tf", "hcl", "yaml", "yml", "sh",
    "bash", "html", "xml", "svg", "css", "ex", "exs",
];

/// Directories excluded from the scan by default (spec §6.3).
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    ".git",
    "__pycache__",
    "target",
    "vendor",
    ".next",
    "tests",
    "test",
    "__tests__",
];

const DEFAULT_DEFINITIONS_DIR: &str = ".guardlink";
const DEFAULT_MAX_FILE_BYTES: u64 = 1_048_576;
const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub include_extensions: HashSet<String>,
    pub exclude_dirs: HashSet<String>,
    pub definitions_dir: String,
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_extensions: DEFAULT_INCLUDE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            definitions_dir: DEFAULT_DEFINITIONS_DIR.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// A shared flag a caller can set to request the scan wind down at the next
/// file boundary (spec §5, "Cancellation").
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub annotations: Vec<Annotation>,
    pub diagnostics: Vec<Diagnostic>,
    /// All files considered part of the project, relative path, sorted.
    pub scanned_files: Vec<String>,
    /// Files that yielded at least one annotation.
    pub annotated_files: Vec<String>,
    pub canceled: bool,
}

/// Scan `root` for GAL annotations, honoring `config`'s include/exclude
/// rules and resource limits. Returns an error only if `root` itself cannot
/// be read (spec §7); per-file failures degrade to warning diagnostics.
pub fn scan_project(root: &Path, config: &ScanConfig, cancel: Option<&CancelFlag>) -> Result<ScanResult> {
    if !root.is_dir() {
        bail!("scan root does not exist or is not a directory: {}", root.display());
    }

    let mut candidates = Vec::new();
    collect_files(root, root, config, &mut candidates)
        .with_context(|| format!("failed to walk scan root: {}", root.display()))?;
    candidates.sort();
    log::debug!("scan root {} yielded {} candidate files", root.display(), candidates.len());

    let mut result = ScanResult::default();

    for rel_path in candidates {
        if let Some(flag) = cancel {
            if flag.is_cancelled() {
                log::warn!("scan of {} canceled at {}", root.display(), rel_path);
                result.diagnostics.push(Diagnostic::warning(
                    rel_path.clone(),
                    0,
                    "scan canceled",
                ));
                result.canceled = true;
                break;
            }
        }

        let abs_path = root.join(&rel_path);

        let bytes = match fs::read(&abs_path) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("could not read {}: {}", rel_path, e);
                result.diagnostics.push(Diagnostic::warning(
                    rel_path.clone(),
                    0,
                    format!("could not read file: {}", e),
                ));
                continue;
            }
        };

        if bytes.len() as u64 > config.max_file_bytes {
            log::warn!(
                "{} exceeds the {}-byte scan limit; skipped",
                rel_path,
                config.max_file_bytes
            );
            result.diagnostics.push(Diagnostic::warning(
                rel_path.clone(),
                0,
                format!(
                    "file exceeds the {}-byte scan limit; skipped",
                    config.max_file_bytes
                ),
            ));
            result.scanned_files.push(rel_path);
            continue;
        }

        if looks_binary(&bytes) {
            log::debug!("{} looks binary; skipped", rel_path);
            result.diagnostics.push(Diagnostic::warning(
                rel_path.clone(),
                0,
                "file appears to be binary; skipped",
            ));
            result.scanned_files.push(rel_path);
            continue;
        }

        let content = String::from_utf8_lossy(&bytes);
        let (mut annotations, mut diagnostics) = parse_file(&rel_path, &content);

        if !annotations.is_empty() {
            result.annotated_files.push(rel_path.clone());
        }
        result.scanned_files.push(rel_path);
        result.annotations.append(&mut annotations);
        result.diagnostics.append(&mut diagnostics);
    }

    Ok(result)
}

fn looks_binary(bytes: &[u8]) -> bool {
    let n = bytes.len().min(BINARY_SNIFF_BYTES);
    bytes[..n].contains(&0)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    config: &ScanConfig,
    out: &mut Vec<String>,
) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("could not read directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        let is_definitions_dir = name == config.definitions_dir;

        if path.is_dir() {
            if !is_definitions_dir {
                if is_hidden(&name) || config.exclude_dirs.contains(name.as_ref()) {
                    continue;
                }
            }
            collect_files(root, &path, config, out)?;
            continue;
        }

        if !is_definitions_dir && is_hidden(&name) {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !config.include_extensions.contains(&ext.to_ascii_lowercase()) {
            continue;
        }

        if let Some(rel) = normalize_relative(root, &path) {
            out.push(rel);
        }
    }

    Ok(())
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Render `path` relative to `root` with forward-slash separators,
/// regardless of host filesystem (spec §4.6, property P7).
fn normalize_relative(root: &Path, path: &Path) -> Option<String> {
    let rel: PathBuf = path.strip_prefix(root).ok()?.to_path_buf();
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn scans_included_extensions_only() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.rs", "// @asset App.A (#a)\n");
        write(tmp.path(), "ignore.txt", "// @asset App.B (#b)\n");

        let result = scan_project(tmp.path(), &ScanConfig::default(), None).unwrap();
        assert_eq!(result.scanned_files, vec!["a.rs".to_string()]);
        assert_eq!(result.annotations.len(), 1);
    }

    #[test]
    fn excludes_default_directories() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "node_modules/dep.js", "// @asset Dep (#d)\n");
        write(tmp.path(), "src/main.rs", "// @asset App (#app)\n");

        let result = scan_project(tmp.path(), &ScanConfig::default(), None).unwrap();
        assert_eq!(result.scanned_files, vec!["src/main.rs".to_string()]);
    }

    #[test]
    fn definitions_dir_is_scanned_despite_dot_prefix() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".guardlink/defs.yaml", "# @asset App (#app)\n");
        write(tmp.path(), ".other/skip.yaml", "# @asset Skip (#skip)\n");

        let result = scan_project(tmp.path(), &ScanConfig::default(), None).unwrap();
        assert_eq!(result.scanned_files, vec![".guardlink/defs.yaml".to_string()]);
    }

    #[test]
    fn paths_are_forward_slash_normalized() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/b/c.rs", "// @asset App (#app)\n");

        let result = scan_project(tmp.path(), &ScanConfig::default(), None).unwrap();
        assert_eq!(result.scanned_files, vec!["a/b/c.rs".to_string()]);
    }

    #[test]
    fn oversized_file_is_skipped_with_warning() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "big.rs", "x");

        let mut config = ScanConfig::default();
        config.max_file_bytes = 0;

        let result = scan_project(tmp.path(), &config, None).unwrap();
        assert!(result.annotations.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.scanned_files, vec!["big.rs".to_string()]);
    }

    #[test]
    fn binary_file_is_skipped_with_warning() {
        let tmp = TempDir::new().unwrap();
        let mut bytes = b"// @asset".to_vec();
        bytes.push(0);
        fs::write(tmp.path().join("bin.rs"), bytes).unwrap();

        let result = scan_project(tmp.path(), &ScanConfig::default(), None).unwrap();
        assert!(result.annotations.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("does-not-exist");
        assert!(scan_project(&missing, &ScanConfig::default(), None).is_err());
    }

    #[test]
    fn cancellation_stops_at_file_boundary() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.rs", "// @asset A (#a)\n");
        write(tmp.path(), "b.rs", "// @asset B (#b)\n");

        let flag = CancelFlag::new();
        flag.cancel();

        let result = scan_project(tmp.path(), &ScanConfig::default(), Some(&flag)).unwrap();
        assert!(result.canceled);
    }
}
