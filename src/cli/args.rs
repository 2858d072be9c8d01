use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Threat-modeling-as-code: extract GAL annotations and assemble a threat model", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a project, assemble a threat model, and print it as JSON
    Scan {
        /// Root directory to scan
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Path to a guardlink.toml config file (default: <root>/guardlink.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Restrict scanning to these extensions (overrides config)
        #[arg(long = "include")]
        include: Vec<String>,

        /// Exclude these directory names (overrides config)
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Exit non-zero on warning diagnostics too, not just errors
        #[arg(long)]
        strict: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Scan, assemble, and validate; print diagnostics and unmitigated exposures
    Validate {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Scan, assemble, and run one query against the model
    Query {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Query string, e.g. "flows into App.API" or "unmitigated"
        query: String,
    },

    /// Diff two previously serialized ThreatModel JSON documents
    Diff {
        /// Path to the "before" ThreatModel JSON file
        before: PathBuf,

        /// Path to the "after" ThreatModel JSON file
        after: PathBuf,
    },
}
