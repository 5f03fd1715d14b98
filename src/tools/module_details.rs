//! Module detail lookup, including R help documentation.

use super::{module_not_found, validated_module_name, AppContext};
use crate::error::Result;
use crate::render::{required_datasets_line, truncate_response, ResponseFormat};
use crate::rscript::fetch_r_help;
use serde::Deserialize;
use serde_json::json;

/// Defaulted parameters shown before the "and N more" elision.
const MAX_DEFAULTED_PARAMS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct Params {
    pub module_name: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let module_name = validated_module_name(&params.module_name)?;

    let record = match ctx.catalog.get(&module_name) {
        Some(record) => record,
        None => {
            let mut msg = module_not_found(&ctx.catalog, &module_name);
            msg.push_str("\n\nUse tealflow_list_modules to see all available modules.");
            return Ok(msg);
        }
    };

    let r_help = fetch_r_help(
        ctx.rscript.as_ref(),
        &record.name,
        record.package.full_package_name(),
        ctx.rscript_timeout(),
    )
    .await;

    let response = match params.response_format {
        ResponseFormat::Markdown => {
            let mut lines: Vec<String> = vec![format!("# {}", record.name), String::new()];
            lines.push(format!("**Package**: {}", record.package.full_package_name()));
            let description = if record.description.is_empty() {
                "N/A"
            } else {
                &record.description
            };
            lines.push(format!("**Description**: {}", description));
            lines.push(String::new());
            lines.push(format!(
                "**Required Datasets**: {}",
                required_datasets_line(record)
            ));
            lines.push(String::new());

            if !record.parameters.required_params.is_empty() {
                lines.push("## Required Parameters".to_string());
                lines.push(String::new());
                for (name, spec) in &record.parameters.required_params {
                    lines.push(format!("### `{}`", name));
                    lines.push(format!("- **Type**: {}", spec.param_type));
                    let description = if spec.description.is_empty() {
                        "N/A"
                    } else {
                        &spec.description
                    };
                    lines.push(format!("- **Description**: {}", description));
                    lines.push(String::new());
                }
            }

            let defaults = &record.parameters.params_with_defaults;
            if !defaults.is_empty() {
                lines.push("## Optional Parameters (with defaults)".to_string());
                lines.push(String::new());
                for (name, default) in defaults.iter().take(MAX_DEFAULTED_PARAMS) {
                    lines.push(format!("### `{}`", name));
                    lines.push(format!("- **Default**: `{}`", default));
                    lines.push(String::new());
                }
                if defaults.len() > MAX_DEFAULTED_PARAMS {
                    lines.push(format!(
                        "... and {} more optional parameters",
                        defaults.len() - MAX_DEFAULTED_PARAMS
                    ));
                    lines.push(String::new());
                }
            }

            lines.push("## R Help Documentation".to_string());
            lines.push(String::new());
            lines.push("```".to_string());
            lines.push(r_help.clone());
            lines.push("```".to_string());
            lines.push(String::new());

            lines.join("\n")
        }
        ResponseFormat::Json => {
            let payload = json!({
                "module_name": record.name,
                "package": record.package.full_package_name(),
                "description": record.description,
                "required_datasets": record.required_display(),
                "parameters": record.parameters,
                "r_help": r_help,
            });
            serde_json::to_string_pretty(&payload)?
        }
    };

    Ok(truncate_response(response, None))
}
