//! Output formatting shared by the command-line tool
//!
//! Query results have columns only known at runtime, so they are rendered
//! through `tabled`'s builder rather than derived `Tabled` rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::database::{value_to_string, QueryOutcome};

/// Default maximum length for a cell in table output
pub const DEFAULT_CELL_MAX_LEN: usize = 40;

/// Unified output format for all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    /// Check if this is a JSON variant
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }

    /// Check if this is a table variant
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty", "psv"]
    }

    /// Serialize a value as JSON in this format's style
    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<String, serde_json::Error> {
        match self {
            Self::JsonPretty => serde_json::to_string_pretty(value),
            _ => serde_json::to_string(value),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Truncate a string to the specified length, adding "..." if truncated
///
/// # Examples
///
/// ```
/// use eventdb::utils::truncate_cell;
///
/// assert_eq!(truncate_cell("Short", 20), "Short");
/// assert_eq!(truncate_cell("This is a very long name", 20), "This is a very lo...");
/// ```
pub fn truncate_cell(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Render query rows in the requested format
pub fn render_outcome(outcome: &QueryOutcome, format: OutputFormat) -> Result<String, serde_json::Error> {
    if format.is_json() {
        return format.to_json(&outcome.rows());
    }

    let header: Vec<String> = outcome.columns().to_vec();
    let records = outcome.iter().map(|row| {
        row.values()
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
    });

    Ok(match format {
        OutputFormat::Psv => std::iter::once(header)
            .chain(records)
            .map(|fields| fields.join("|"))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => {
            let mut builder = Builder::default();
            builder.push_record(header);
            for record in records {
                builder.push_record(
                    record
                        .iter()
                        .map(|cell| truncate_cell(cell, DEFAULT_CELL_MAX_LEN)),
                );
            }
            match format {
                OutputFormat::Markdown => builder.build().with(Style::markdown()).to_string(),
                _ => builder.build().with(Style::rounded()).to_string(),
            }
        }
    })
}
