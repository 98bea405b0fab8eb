//! Table output formatting for CLI commands
//!
//! Renders the action catalogue with comfy-table. Colors are dropped when
//! `NO_COLOR` is set or the terminal is dumb.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::ActionKind;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format the action catalogue as a table
    pub fn format_actions(&self, actions: &[ActionKind]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Action").add_attribute(Attribute::Bold),
            Cell::new("Parameter").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Description").add_attribute(Attribute::Bold),
        ]);

        for kind in actions {
            let parameter = kind.parameter().map_or_else(|| "-".to_string(), |p| format!("--{p}"));
            let (status, color) = if kind.is_available() {
                ("available", Color::Green)
            } else {
                ("reserved", Color::DarkGrey)
            };
            let status_cell = if self.use_colors {
                Cell::new(status).fg(color)
            } else {
                Cell::new(status)
            };

            table.add_row(vec![
                Cell::new(kind.as_str()),
                Cell::new(parameter),
                status_cell,
                Cell::new(kind.description()),
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
