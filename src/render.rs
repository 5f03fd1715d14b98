//! Shared rendering helpers for tool responses.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::{ModuleRecord, PackageFilter};
use crate::constants::CHARACTER_LIMIT;

/// Output format selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Markdown,
    Json,
}

const TRUNCATION_MESSAGE: &str = "Response truncated. Use filters to reduce results.";

/// Cap a rendered response at the character budget, appending a notice when
/// anything was cut. Counts characters, not bytes, so multibyte markers in
/// the markdown never split.
pub fn truncate_response(response: String, message: Option<&str>) -> String {
    truncate_response_at(response, message, CHARACTER_LIMIT)
}

fn truncate_response_at(response: String, message: Option<&str>, limit: usize) -> String {
    let total_chars = response.chars().count();
    if total_chars <= limit {
        return response;
    }
    let message = message.unwrap_or(TRUNCATION_MESSAGE);
    let keep = limit.saturating_sub(message.chars().count() + 10);
    let mut truncated: String = response.chars().take(keep).collect();
    truncated.push_str("\n\n... ");
    truncated.push_str(message);
    truncated
}

/// Human-readable byte counts for dataset file reporting.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Title-case words, with underscores treated as word separators.
pub fn title_words(s: &str) -> String {
    s.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The required-datasets line used across module listings and details.
pub fn required_datasets_line(record: &ModuleRecord) -> String {
    if record.required_capabilities.is_empty() {
        "None (works with any data.frame)".to_string()
    } else {
        record.required_display().join(", ")
    }
}

/// Render a module listing in the requested format.
pub fn format_module_list(
    modules: &[&ModuleRecord],
    package: PackageFilter,
    format: ResponseFormat,
) -> String {
    match format {
        ResponseFormat::Json => {
            let entries: Vec<_> = modules
                .iter()
                .map(|m| {
                    json!({
                        "name": m.name,
                        "description": m.description,
                        "required_datasets": m.required_display(),
                    })
                })
                .collect();
            let payload = json!({ "modules": entries, "count": modules.len() });
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
        }
        ResponseFormat::Markdown => {
            let mut out = format!("# Teal Modules ({})\n\n", title_words(package.as_str()));
            for module in modules {
                out.push_str(&format!("## {}\n", module.name));
                let description = if module.description.is_empty() {
                    "N/A"
                } else {
                    &module.description
                };
                out.push_str(&format!("**Description**: {}\n", description));
                out.push_str(&format!(
                    "**Required Datasets**: {}\n\n",
                    required_datasets_line(module)
                ));
            }
            out
        }
    }
}
