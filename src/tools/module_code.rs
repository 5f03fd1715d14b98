//! R code generation for adding a module to a Teal application.
//!
//! Clinical modules get concrete `choices_selected` defaults wired to the
//! module's datasets; general modules get a `data_extract_spec` scaffold
//! with TODO markers, since they work against arbitrary data frames.

use super::{module_not_found, validated_module_name, AppContext};
use crate::catalog::{ModuleRecord, PackageKind};
use crate::error::Result;
use serde::Deserialize;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct Params {
    pub module_name: String,
    /// Parameter overrides; accepted for interface stability but not yet applied.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub include_comments: bool,
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let name = validated_module_name(&params.module_name)?;
    let Some(record) = ctx.catalog.get(&name) else {
        return Ok(module_not_found(&ctx.catalog, &name));
    };

    Ok(match record.package {
        PackageKind::Clinical => clinical_module_code(record, params.include_comments),
        PackageKind::General => general_module_code(record, params.include_comments),
    })
}

fn module_label(record: &ModuleRecord) -> &str {
    if record.description.is_empty() {
        &record.name
    } else {
        &record.description
    }
}

/// Drop the trailing comma from the last emitted parameter line so the R
/// call parses. With comments enabled the last line is a comment, so the
/// final parameter keeps its comma; R tolerates that inside a call.
fn strip_trailing_comma(lines: &mut [String]) {
    if let Some(last) = lines.last_mut() {
        if last.ends_with(',') {
            last.pop();
        }
    }
}

fn clinical_module_code(record: &ModuleRecord, comments: bool) -> String {
    let datasets = record.required_display();
    let actual_dataname = if datasets.len() > 1 {
        datasets[1].as_str()
    } else {
        datasets.first().map(String::as_str).unwrap_or("ADSL")
    };
    let parent_dataname = datasets.first().map(String::as_str).unwrap_or("ADSL");
    let label = module_label(record);

    let mut lines: Vec<String> = Vec::new();
    if comments {
        lines.push(format!("# {label}"));
        lines.push(format!("# Required datasets: {}", datasets.join(", ")));
        lines.push(String::new());
    }
    lines.push(format!("{}(", record.name));

    let required = &record.parameters.required_params;
    let mut param_lines: Vec<String> = Vec::new();

    // Patient profile modules declare only `label` but still need the
    // dataset wiring spelled out.
    if record.is_patient_profile() && required.len() == 1 && required.contains_key("label") {
        param_lines.push(format!("  label = \"{label}\","));
        param_lines.push(format!("  dataname = \"{actual_dataname}\","));
        if datasets.len() > 1 {
            param_lines.push(format!("  parentname = \"{parent_dataname}\","));
        }
    } else {
        for (param, spec) in required {
            if comments {
                param_lines.push(format!("  # {}", spec.description));
            }
            match param.as_str() {
                "label" => param_lines.push(format!("  label = \"{label}\",")),
                "dataname" => param_lines.push(format!("  dataname = \"{actual_dataname}\",")),
                p if p.contains("arm_var") => param_lines.push(
                    "  arm_var = choices_selected(variable_choices(ADSL, \
                     subset = arm_vars), selected = \"ARM\"),"
                        .to_string(),
                ),
                "paramcd" => param_lines.push(format!(
                    "  paramcd = choices_selected(value_choices({actual_dataname}, \
                     \"PARAMCD\", \"PARAM\"), selected = NULL),"
                )),
                "strata_var" => param_lines.push(
                    "  strata_var = choices_selected(variable_choices(ADSL, \
                     subset = strata_vars), selected = \"STRATA1\"),"
                        .to_string(),
                ),
                "facet_var" => param_lines.push(
                    "  facet_var = choices_selected(variable_choices(ADSL, \
                     subset = facet_vars), selected = NULL),"
                        .to_string(),
                ),
                p if p.contains("subgroup_var") => param_lines.push(
                    "  subgroup_var = choices_selected(variable_choices(ADSL, \
                     subset = facet_vars), selected = NULL),"
                        .to_string(),
                ),
                "time_points" => param_lines
                    .push("  time_points = choices_selected(c(182, 365, 547), 182),".to_string()),
                "hlt" => param_lines.push(format!(
                    "  hlt = choices_selected(variable_choices({actual_dataname}, \
                     c(\"AEBODSYS\", \"AEHLT\")), selected = \"AEBODSYS\"),"
                )),
                "llt" => param_lines.push(format!(
                    "  llt = choices_selected(variable_choices({actual_dataname}, \
                     c(\"AEDECOD\", \"AELLT\")), selected = \"AEDECOD\"),"
                )),
                "grade" => param_lines.push(format!(
                    "  grade = choices_selected(variable_choices({actual_dataname}, \
                     \"AETOXGR\"), selected = \"AETOXGR\"),"
                )),
                other => param_lines.push(format!("  {other} = # TODO: Configure {other},")),
            }
        }
    }

    if comments {
        param_lines.push("  # Optional parameters - adjust as needed".to_string());
    }
    strip_trailing_comma(&mut param_lines);
    lines.extend(param_lines);
    lines.push(")".to_string());

    if comments {
        lines.push(String::new());
        lines.push("# Note: Adjust parameters based on your specific requirements".to_string());
        lines.push(
            "# Use tealflow_get_module_details for complete parameter documentation".to_string(),
        );
    }

    lines.join("\n")
}

const GENERAL_EXAMPLES: &str = r#"# Example with actual configuration for ADSL dataset:
# x = data_extract_spec(
#   dataname = "ADSL",
#   select = select_spec(
#     label = "Select X variable:",
#     choices = variable_choices(ADSL, c("AGE", "BMRKR1", "BMRKR2")),
#     selected = "AGE",
#     multiple = FALSE,
#     fixed = FALSE
#   )
# )

# For long datasets with filtering:
# y = data_extract_spec(
#   dataname = "ADLB",
#   filter = filter_spec(
#     vars = "PARAMCD",
#     choices = value_choices(ADLB, "PARAMCD", "PARAM"),
#     selected = "ALT",
#     multiple = FALSE
#   ),
#   select = select_spec(
#     choices = "AVAL",
#     selected = "AVAL",
#     fixed = TRUE
#   )
# )

# Use tealflow_get_module_details for complete parameter documentation"#;

fn general_module_code(record: &ModuleRecord, comments: bool) -> String {
    let label = module_label(record);

    let mut lines: Vec<String> = Vec::new();
    if comments {
        lines.push(format!("# {label}"));
        lines.push("# General module - works with any data.frame".to_string());
        lines.push("# Configure data_extract_spec for your specific datasets".to_string());
        lines.push(String::new());
    }
    lines.push(format!("{}(", record.name));

    let mut param_lines: Vec<String> = Vec::new();
    for (param, spec) in &record.parameters.required_params {
        if param == "label" {
            param_lines.push(format!("  label = \"{label}\","));
        } else if spec.param_type.contains("data_extract_spec") {
            if comments {
                param_lines.push(format!("  # {}", spec.description));
            }
            param_lines.push(format!("  {param} = data_extract_spec("));
            param_lines
                .push("    dataname = \"ADSL\",  # TODO: Specify your dataset name".to_string());
            param_lines.push("    select = select_spec(".to_string());
            param_lines.push("      label = \"Select variable:\",".to_string());
            param_lines.push(
                "      choices = variable_choices(\"ADSL\"),  # TODO: Specify available columns"
                    .to_string(),
            );
            param_lines.push("      selected = NULL,  # TODO: Set default selection".to_string());
            param_lines.push(
                "      multiple = FALSE,  # Set TRUE to allow multiple selections".to_string(),
            );
            param_lines.push("      fixed = FALSE  # Set TRUE to prevent user changes".to_string());
            param_lines.push("    )".to_string());
            if comments {
                param_lines.push(
                    "    # Optional: Add filter_spec to subset data before selection".to_string(),
                );
                param_lines.push("    # filter = filter_spec(".to_string());
                param_lines.push("    #   label = \"Filter data:\",".to_string());
                param_lines
                    .push("    #   vars = c(\"ARM\", \"SEX\"),  # Variables to filter on".to_string());
                param_lines.push(
                    "    #   choices = value_choices(\"ADSL\", \"ARM\"),  # Available values"
                        .to_string(),
                );
                param_lines.push("    #   selected = NULL,  # Default filter values".to_string());
                param_lines.push("    #   multiple = TRUE  # Allow multiple selections".to_string());
                param_lines.push("    # )".to_string());
            }
            param_lines.push("  ),".to_string());
        } else {
            if comments {
                param_lines.push(format!("  # {}", spec.description));
            }
            let default = record
                .parameters
                .params_with_defaults
                .get(param)
                .map(render_default)
                .unwrap_or_else(|| "NULL".to_string());
            param_lines.push(format!("  {param} = {default},  # TODO: Configure this parameter"));
        }
    }

    strip_trailing_comma(&mut param_lines);
    lines.extend(param_lines);
    lines.push(")".to_string());

    if comments {
        lines.push(String::new());
        lines.push(GENERAL_EXAMPLES.to_string());
    }

    lines.join("\n")
}

fn render_default(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;

    fn params(name: &str, comments: bool) -> Params {
        Params {
            module_name: name.to_string(),
            parameters: None,
            include_comments: comments,
        }
    }

    #[tokio::test]
    async fn clinical_code_wires_datasets_into_defaults() {
        let ctx = testing::context();
        let code = run(&ctx, params("tm_g_km", true)).await.unwrap();

        assert!(code.starts_with("# Kaplan-Meier survival plot"));
        assert!(code.contains("# Required datasets: ADSL, ADTTE"));
        assert!(code.contains("tm_g_km("));
        assert!(code.contains("  label = \"Kaplan-Meier survival plot\","));
        assert!(code.contains("  dataname = \"ADTTE\","));
        assert!(code.contains(
            "  arm_var = choices_selected(variable_choices(ADSL, subset = arm_vars), selected = \"ARM\"),"
        ));
        assert!(code.contains(
            "  paramcd = choices_selected(value_choices(ADTTE, \"PARAMCD\", \"PARAM\"), selected = NULL),"
        ));
        assert!(code.contains("  # Optional parameters - adjust as needed"));
        assert!(code.ends_with(
            "# Use tealflow_get_module_details for complete parameter documentation"
        ));
    }

    #[tokio::test]
    async fn clinical_code_without_comments_strips_last_comma() {
        let ctx = testing::context();
        let code = run(&ctx, params("tm_g_km", false)).await.unwrap();

        assert!(!code.contains('#'));
        // BTreeMap ordering puts paramcd last; its comma is gone.
        assert!(code.contains("selected = NULL)\n)"));
        assert!(code.ends_with(")"));
    }

    #[tokio::test]
    async fn patient_profile_gets_explicit_dataset_wiring() {
        let ctx = testing::context();
        let code = run(&ctx, params("tm_g_pp_vitals", false)).await.unwrap();

        assert!(code.contains("  label = \"Patient profile vitals plot\","));
        assert!(code.contains("  dataname = \"ADVS\","));
        assert!(code.contains("  parentname = \"ADSL\"\n)"));
    }

    #[tokio::test]
    async fn general_code_scaffolds_data_extract_spec() {
        let ctx = testing::context();
        let code = run(&ctx, params("tm_g_scatterplot", true)).await.unwrap();

        assert!(code.contains("# General module - works with any data.frame"));
        assert!(code.contains("  x = data_extract_spec("));
        assert!(code.contains("  y = data_extract_spec("));
        assert!(code.contains("    dataname = \"ADSL\",  # TODO: Specify your dataset name"));
        assert!(code.contains("    # filter = filter_spec("));
        // Last spec block loses its comma before the closing paren.
        assert!(code.contains("  )\n)"));
        assert!(code.contains("# For long datasets with filtering:"));
    }

    #[tokio::test]
    async fn general_code_without_comments_skips_examples() {
        let ctx = testing::context();
        let code = run(&ctx, params("tm_g_scatterplot", false)).await.unwrap();

        assert!(!code.contains("# Example with actual configuration"));
        assert!(!code.contains("# filter = filter_spec("));
        assert!(code.contains("  x = data_extract_spec("));
    }

    #[tokio::test]
    async fn unknown_module_suggests_close_name() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_g_kma", true)).await.unwrap();
        assert_eq!(
            out,
            "Error: Module 'tm_g_kma' not found. Did you mean 'tm_g_km'?"
        );
    }
}
