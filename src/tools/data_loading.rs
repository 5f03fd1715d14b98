//! R data-loading code generation for discovered datasets.

use super::AppContext;
use crate::error::{Result, TealflowError};
use crate::render::ResponseFormat;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

/// One dataset reference, the shape the discovery tool emits.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRef {
    pub name: String,
    pub path: String,
    pub format: String,
    #[serde(default)]
    pub is_standard_adam: bool,
}

#[derive(Debug, Deserialize)]
pub struct Params {
    pub datasets: Vec<DatasetRef>,
    /// When given, dataset paths inside this directory become relative.
    #[serde(default)]
    pub project_directory: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

pub async fn run(_ctx: &AppContext, params: Params) -> Result<String> {
    let mut datasets = params.datasets;
    if datasets.is_empty() {
        return Err(TealflowError::InvalidParameter(
            "No datasets provided".to_string(),
        ));
    }

    if let Some(project_dir) = params.project_directory.as_deref() {
        for dataset in &mut datasets {
            if let Ok(relative) = Path::new(&dataset.path).strip_prefix(project_dir) {
                dataset.path = relative.to_string_lossy().into_owned();
            }
        }
    }

    // ADSL is the parent dataset, so it loads first; the rest alphabetical.
    datasets.sort_by(|a, b| {
        (a.name != "ADSL")
            .cmp(&(b.name != "ADSL"))
            .then_with(|| a.name.cmp(&b.name))
    });

    let code = generate_code(&datasets);
    let names: Vec<&str> = datasets.iter().map(|d| d.name.as_str()).collect();

    Ok(match params.response_format {
        ResponseFormat::Markdown => {
            let mut lines: Vec<String> = vec!["# Data Loading Code".to_string(), String::new()];
            lines.push(format!(
                "Generated loading code for {} dataset(s): {}",
                names.len(),
                names.join(", ")
            ));
            lines.push(String::new());
            lines.push("```r".to_string());
            lines.push(code);
            lines.push("```".to_string());
            lines.push(String::new());
            lines.push("## Usage".to_string());
            lines.push(String::new());
            lines.push("1. Save this code as `data/data.R` in your project".to_string());
            lines.push("2. Source it from your app: `source(\"data/data.R\")`".to_string());
            lines.push(
                "3. Pass the `data` object to `init(data = data, modules = ...)`".to_string(),
            );
            lines.join("\n")
        }
        ResponseFormat::Json => {
            let payload = json!({
                "code": code,
                "datasets": names,
                "file_path": "data/data.R",
                "instructions": [
                    "Save the code as data/data.R",
                    "Source it from app.R with source(\"data/data.R\")",
                    "Pass the data object to init(data = data, modules = ...)",
                ],
            });
            serde_json::to_string_pretty(&payload)?
        }
    })
}

/// Emit the loading script: one load line per dataset, then the `teal_data`
/// block. Standard-only inputs get `default_cdisc_join_keys`; any custom
/// dataset downgrades to a manual join-keys warning.
fn generate_code(datasets: &[DatasetRef]) -> String {
    let mut lines: Vec<String> = vec!["library(teal)".to_string(), String::new()];

    for dataset in datasets {
        if dataset.format.eq_ignore_ascii_case("rds") {
            lines.push(format!("{} <- readRDS(\"{}\")", dataset.name, dataset.path));
        } else {
            lines.push(format!(
                "{} <- read.csv(\"{}\", stringsAsFactors = FALSE)",
                dataset.name, dataset.path
            ));
        }
    }
    lines.push(String::new());

    let all_standard = datasets.iter().all(|d| d.is_standard_adam);

    lines.push("## Data reproducible code ----".to_string());
    if !all_standard {
        lines.push("# WARNING: Non-standard datasets detected".to_string());
        lines.push("# You may need to configure join_keys manually".to_string());
    }
    lines.push("data <- teal_data(".to_string());
    for (i, dataset) in datasets.iter().enumerate() {
        let last = i + 1 == datasets.len();
        if last && !all_standard {
            lines.push(format!("  {} = {}", dataset.name, dataset.name));
        } else {
            lines.push(format!("  {} = {},", dataset.name, dataset.name));
        }
    }
    if all_standard {
        let quoted: Vec<String> = datasets.iter().map(|d| format!("\"{}\"", d.name)).collect();
        lines.push(format!(
            "  join_keys = default_cdisc_join_keys[c({})]",
            quoted.join(", ")
        ));
    }
    lines.push(")".to_string());

    lines.join("\n")
}
