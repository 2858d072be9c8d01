mod cli;
mod config;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use serde_json::json;

use cli::{Args, Commands};
use config::GuardlinkConfig;
use guardlink_core::DiagnosticLevel;
use guardlink_model::ThreatModel;
use guardlink_scanner::scan_project;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbosity);

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    match args.command {
        Commands::Scan { root, config, include, exclude, strict, pretty } => {
            scan_command(&root, config.as_deref(), &include, &exclude, strict, pretty)
        }
        Commands::Validate { root, config } => validate_command(&root, config.as_deref()),
        Commands::Query { root, config, query } => query_command(&root, config.as_deref(), &query),
        Commands::Diff { before, after } => diff_command(&before, &after),
    }
}

fn load_model(root: &Path, config_path: Option<&Path>, include: &[String], exclude: &[String]) -> Result<(ThreatModel, Vec<guardlink_core::Diagnostic>)> {
    let config = GuardlinkConfig::load(root, config_path)?.with_cli_overrides(include, exclude);
    log::debug!("scanning {} with config {:?}", root.display(), config);

    let scan_config = config.to_scan_config();
    let scan_result = scan_project(root, &scan_config, None)?;

    log::info!(
        "scanned {} files, {} annotated",
        scan_result.scanned_files.len(),
        scan_result.annotated_files.len()
    );

    let (model, diagnostics) = guardlink_model::assemble(
        config.project_label(),
        &config.definitions_dir,
        scan_result.scanned_files,
        scan_result.annotations,
        scan_result.diagnostics,
    );

    Ok((model, diagnostics))
}

fn print_diagnostics(diagnostics: &[guardlink_core::Diagnostic]) {
    for d in diagnostics {
        let tag = match d.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        eprintln!("{}:{}: {}: {}", d.file, d.line, tag, d.message);
    }
}

fn exit_code_for(diagnostics: &[guardlink_core::Diagnostic], strict: bool) -> ExitCode {
    let has_error = diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error);
    let has_warning = diagnostics.iter().any(|d| d.level == DiagnosticLevel::Warning);
    if has_error || (strict && has_warning) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn scan_command(
    root: &Path,
    config_path: Option<&Path>,
    include: &[String],
    exclude: &[String],
    strict: bool,
    pretty: bool,
) -> Result<ExitCode> {
    let (model, mut diagnostics) = load_model(root, config_path, include, exclude)?;
    diagnostics.extend(guardlink_model::dangling_refs(&model));
    print_diagnostics(&diagnostics);

    let output = if pretty {
        serde_json::to_string_pretty(&model)
    } else {
        serde_json::to_string(&model)
    }
    .context("failed to serialize threat model")?;
    println!("{output}");

    Ok(exit_code_for(&diagnostics, strict))
}

fn validate_command(root: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let (model, _assembly_diagnostics) = load_model(root, config_path, &[], &[])?;
    let report = guardlink_model::validate(&model);
    print_diagnostics(&report.diagnostics);

    let output = json!({
        "diagnostics": report.diagnostics,
        "unmitigated": report.unmitigated,
        "coverage_percent": report.coverage_percent,
    });
    println!("{}", serde_json::to_string_pretty(&output).context("failed to serialize validation report")?);

    Ok(exit_code_for(&report.diagnostics, false))
}

fn query_command(root: &Path, config_path: Option<&Path>, query: &str) -> Result<ExitCode> {
    let (model, _diagnostics) = load_model(root, config_path, &[], &[])?;
    let response = guardlink_query::query(&model, query);
    println!("{}", serde_json::to_string_pretty(&response).context("failed to serialize query response")?);
    Ok(ExitCode::SUCCESS)
}

fn diff_command(before_path: &Path, after_path: &Path) -> Result<ExitCode> {
    let before = load_serialized_model(before_path)?;
    let after = load_serialized_model(after_path)?;
    let report = guardlink_diff::diff(&before, &after);
    println!("{}", serde_json::to_string_pretty(&report).context("failed to serialize diff report")?);
    Ok(ExitCode::SUCCESS)
}

fn load_serialized_model(path: &Path) -> Result<ThreatModel> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read threat model file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid threat model JSON: {}", path.display()))
}
