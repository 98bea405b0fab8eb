//! Implementation of the `composer config` commands.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

const MASK: &str = "********";

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    /// Explicit config file, if one was given
    pub source: Option<PathBuf>,
    pub config: Config,
}

impl ConfigShowOutput {
    /// Wrap `config` with its API key masked
    pub fn masked(config: &Config, source: Option<&Path>) -> Self {
        let mut config = config.clone();
        if config.service.api_key.is_some() {
            config.service.api_key = Some(MASK.to_string());
        }
        Self {
            source: source.map(Path::to_path_buf),
            config,
        }
    }
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        let header = self.source.as_ref().map_or_else(
            || "# effective configuration (defaults, .composer/, COMPOSER_* env)".to_string(),
            |path| format!("# effective configuration ({}, COMPOSER_* env)", path.display()),
        );
        let body = serde_yaml::to_string(&self.config)
            .unwrap_or_else(|err| format!("# failed to render configuration: {err}"));
        format!("{header}\n{body}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(
    command: ConfigCommands,
    config: &Config,
    source: Option<&Path>,
    json_mode: bool,
) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            output(&ConfigShowOutput::masked(config, source), json_mode);
        }
    }
    Ok(())
}
