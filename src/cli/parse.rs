//! CLI parse: clap types for Strata. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strata CLI - inspect and maintain a Strata object store
#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Inspect and maintain a Strata object store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes a file)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Create the store (if missing) and stamp it with the model
    Init,
    /// Show store, model and per-entity object counts
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List every stored object of an entity
    List {
        entity: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Insert an object: strata insert Book title=Dune pages=412
    Insert {
        entity: String,
        /// Attribute assignments as name=value
        values: Vec<String>,
    },
    /// Update attributes of an object: strata update Book/<key> pages=500
    Update {
        id: String,
        /// Attribute assignments as name=value
        values: Vec<String>,
    },
    /// Delete one object by id
    Delete { id: String },
    /// Remove every object of every entity
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
}
