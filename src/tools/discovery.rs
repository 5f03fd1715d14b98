//! Dataset discovery tool: scan a directory for ADaM dataset files.

use super::AppContext;
use crate::datasets::discovery::{discover_datasets, DiscoveryResult};
use crate::error::Result;
use crate::render::ResponseFormat;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Params {
    pub data_directory: String,
    pub file_formats: Option<Vec<String>>,
    /// Interface compatibility only. Name extraction already restricts
    /// results to ADaM datasets, which is what the default glob expresses.
    pub pattern: String,
    pub response_format: ResponseFormat,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            data_directory: "data/".to_string(),
            file_formats: None,
            pattern: "AD*".to_string(),
            response_format: ResponseFormat::default(),
        }
    }
}

pub async fn run(_ctx: &AppContext, params: Params) -> Result<String> {
    let result = discover_datasets(
        Path::new(&params.data_directory),
        params.file_formats.as_deref(),
    )?;

    Ok(match params.response_format {
        ResponseFormat::Json => serde_json::to_string_pretty(&result)?,
        ResponseFormat::Markdown => render_markdown(&result),
    })
}

fn render_markdown(result: &DiscoveryResult) -> String {
    let mut lines: Vec<String> = vec!["# ADaM Dataset Discovery Results".to_string(), String::new()];

    lines.push("## Summary".to_string());
    lines.push(format!("- **Directory:** `{}`", result.data_directory));
    lines.push(format!("- **Datasets Found:** {}", result.count));
    lines.push(format!(
        "- **Supported Formats:** {}",
        result.supported_formats.join(", ")
    ));
    lines.push(String::new());

    if result.count > 0 {
        lines.push("## Discovered Datasets".to_string());
        lines.push(String::new());
        lines.push("| Dataset | Format | Standard | Size | Path |".to_string());
        lines.push("|---------|--------|----------|------|------|".to_string());
        for dataset in &result.datasets_found {
            let standard = if dataset.is_standard_adam { "✓" } else { "Custom" };
            let size = if dataset.size_bytes > 0 {
                format!("{:.1} KB", dataset.size_bytes as f64 / 1024.0)
            } else {
                "0 B".to_string()
            };
            lines.push(format!(
                "| {} | {} | {} | {} | `{}` |",
                dataset.name, dataset.format, standard, size, dataset.path
            ));
        }
        lines.push(String::new());
    } else {
        lines.push("## No Datasets Found".to_string());
        lines.push(String::new());
        lines.push("No ADaM datasets were found in the specified directory.".to_string());
        lines.push(String::new());
    }

    if !result.warnings.is_empty() {
        lines.push("## Warnings".to_string());
        lines.push(String::new());
        for warning in &result.warnings {
            lines.push(format!("- ⚠️  {}", warning));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
