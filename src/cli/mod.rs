//! Command-line interface for the composer.
//!
//! Every command takes the global `--json` flag and reports through
//! [`output::CommandOutput`]; failures go through [`handle_error`].

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};

use crate::cli::commands::rewrite::RewriteFailed;
use crate::domain::errors::{ComposerError, ErrorKind};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub use output::progress::{create_spinner, ProgressBarExt};
pub use output::{output, CommandOutput};

#[derive(Parser, Debug)]
#[command(name = "composer")]
#[command(about = "Composer - AI-assisted rewriting of text documents", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of `.composer/`
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite a text file (or a range of it) with an action
    Rewrite(commands::rewrite::RewriteArgs),

    /// List the available actions and their parameters
    Actions,

    /// Configuration commands
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

/// Load the configuration from `path`, or hierarchically when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Pipeline error kind carried by `err`, if any
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<ComposerError>()
        .map(ComposerError::kind)
        .or_else(|| err.downcast_ref::<RewriteFailed>().map(|failed| failed.kind))
}

/// Print `err` (styled, or as JSON) and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = error_kind(&err);

    if json_mode {
        let payload = serde_json::json!({
            "error": format!("{err:#}"),
            "kind": kind,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).unwrap_or_default()
        );
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }

    std::process::exit(1)
}
