//! Implementation of the `composer actions` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::ActionKind;

#[derive(Debug, Serialize)]
pub struct ActionInfo {
    pub name: &'static str,
    pub parameter: Option<&'static str>,
    pub available: bool,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ActionsOutput {
    pub actions: Vec<ActionInfo>,
}

impl ActionsOutput {
    pub fn catalogue() -> Self {
        let actions = ActionKind::ALL
            .iter()
            .map(|kind| ActionInfo {
                name: kind.as_str(),
                parameter: kind.parameter(),
                available: kind.is_available(),
                description: kind.description(),
            })
            .collect();
        Self { actions }
    }
}

impl CommandOutput for ActionsOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_actions(&ActionKind::ALL)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(json_mode: bool) -> Result<()> {
    output(&ActionsOutput::catalogue(), json_mode);
    Ok(())
}
