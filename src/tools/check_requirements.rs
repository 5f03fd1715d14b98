//! Dataset compatibility check against a module's declared requirements.

use super::{module_not_found, validated_module_name, AppContext};
use crate::catalog::RequirementToken;
use crate::constants;
use crate::error::Result;
use crate::metrics;
use crate::render::ResponseFormat;
use crate::resolver::{CompatibilityReport, CompatibilityResolver};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct Params {
    pub module_name: String,
    /// Defaults to the project's standard study datasets when omitted.
    #[serde(default)]
    pub available_datasets: Option<Vec<String>>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let module_name = validated_module_name(&params.module_name)?;

    let record = match ctx.catalog.get(&module_name) {
        Some(record) => record,
        None => return Ok(module_not_found(&ctx.catalog, &module_name)),
    };

    let available: Vec<String> = params.available_datasets.unwrap_or_else(|| {
        constants::DEFAULT_AVAILABLE_DATASETS
            .iter()
            .map(|s| s.to_string())
            .collect()
    });

    let report = ctx.resolver.check(record, &available);
    metrics::record_compatibility_verdict(report.compatible);

    // Modules with no declared requirements get the short form.
    if report.required.is_empty() {
        return Ok(match params.response_format {
            ResponseFormat::Markdown => format!(
                "# Dataset Compatibility: {}\n\n✅ **Compatible**\n\n\
                 This module works with any data.frame and has no specific dataset requirements.",
                report.module_name
            ),
            ResponseFormat::Json => {
                let payload = json!({
                    "module_name": report.module_name,
                    "compatible": true,
                    "required_datasets": [],
                    "available_datasets": report.available,
                    "missing_datasets": [],
                });
                serde_json::to_string_pretty(&payload)?
            }
        });
    }

    Ok(match params.response_format {
        ResponseFormat::Markdown => render_markdown(&report),
        ResponseFormat::Json => serde_json::to_string_pretty(&report)?,
    })
}

fn missing_guidance(requirement: &str) -> String {
    match requirement {
        constants::BDS_DATASET_TAG => format!(
            "**{}**: This module needs a BDS (Basic Data Structure) dataset. \
             Typical options: ADLB, ADVS, ADQS. Use tealflow_get_dataset_info to verify \
             your dataset has BDS structure (PARAMCD, AVAL, USUBJID, AVISIT).",
            requirement
        ),
        constants::BDS_CONTINUOUS_TAG => format!(
            "**{}**: This module needs a BDS dataset with continuous AVAL. \
             Typical options: ADLB (lab values), ADVS (vitals), ADQS (questionnaire scores). \
             Use tealflow_get_dataset_info to verify AVAL contains numeric continuous values.",
            requirement
        ),
        constants::BDS_BINARY_TAG => format!(
            "**{}**: This module needs a BDS dataset with binary AVAL (0/1). \
             Typical options: ADRS (response data) or derived binary variables. \
             Use tealflow_get_dataset_info to verify AVAL is binary.",
            requirement
        ),
        other => format!(
            "**{}**: Specific dataset required. Ensure this dataset is loaded \
             before using this module.",
            other
        ),
    }
}

fn render_markdown(report: &CompatibilityReport) -> String {
    let mut lines: Vec<String> =
        vec![format!("# Dataset Compatibility: {}", report.module_name), String::new()];

    if report.compatible {
        lines.push("✅ **Compatible** - All required datasets are available".to_string());
    } else {
        lines.push("❌ **Incompatible** - Missing required datasets".to_string());
    }
    lines.push(String::new());

    if report.compatible && !report.combinations.is_empty() {
        lines.push("## Compatible Dataset Combinations".to_string());
        lines.push(String::new());
        lines.push("You can use this module with any of these dataset combinations:".to_string());
        for combo in &report.combinations {
            lines.push(format!("- **{}**", combo));
        }
        lines.push(String::new());
    }

    lines.push("## Details".to_string());
    lines.push(String::new());
    lines.push(format!("**Required Datasets**: {}", report.required.join(", ")));
    if !report.typical.is_empty() {
        lines.push(format!("**Typical Datasets**: {}", report.typical.join(", ")));
    }
    lines.push(format!("**Available Datasets**: {}", report.available.join(", ")));

    // Flexible requirements show which available datasets satisfied them.
    for entry in &report.matched {
        if RequirementToken::parse(&entry.requirement).is_flexible() {
            lines.push(format!(
                "**Matched {}**: {}",
                entry.requirement,
                entry.datasets.join(", ")
            ));
        }
    }

    if !report.missing.is_empty() {
        lines.push(format!("**Missing Datasets**: {}", report.missing.join(", ")));
        lines.push(String::new());
        for miss in &report.missing {
            lines.push(missing_guidance(miss));
        }
        lines.push(String::new());
        lines.push(
            "**Suggestion**: Use tealflow_get_dataset_info on your available datasets to verify \
             they meet the module's requirements, or choose a different module."
                .to_string(),
        );
    }

    if !report.details.is_empty() {
        lines.push(String::new());
        lines.push("## Dataset Requirements Details".to_string());
        for (dataset, requirement) in &report.details {
            lines.push(format!("- **{}**: {}", dataset, requirement));
        }
    }

    if !report.notes.is_empty() {
        lines.push(String::new());
        lines.push(format!("**Note**: {}", report.notes));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;

    fn params(name: &str, available: Option<&[&str]>) -> Params {
        Params {
            module_name: name.to_string(),
            available_datasets: available
                .map(|list| list.iter().map(|s| s.to_string()).collect()),
            response_format: ResponseFormat::Markdown,
        }
    }

    #[tokio::test]
    async fn compatible_markdown_shows_combinations() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_g_km", Some(&["ADSL", "ADTTE", "ADLB"])))
            .await
            .unwrap();
        assert!(out.starts_with("# Dataset Compatibility: tm_g_km"));
        assert!(out.contains("✅ **Compatible** - All required datasets are available"));
        assert!(out.contains("- **ADSL + ADTTE**"));
        assert!(out.contains("**Required Datasets**: ADSL, ADTTE"));
        assert!(out.contains("**Available Datasets**: ADSL, ADTTE, ADLB"));
        assert!(out.contains("## Dataset Requirements Details"));
        assert!(out.contains("- **ADTTE**: Time-to-event data with AVAL and CNSR"));
    }

    #[tokio::test]
    async fn flexible_match_lists_satisfying_datasets() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_t_ancova", Some(&["ADSL", "ADLB", "ADVS"])))
            .await
            .unwrap();
        assert!(out.contains("**Matched BDS_CONTINUOUS**: ADLB, ADVS"));
        assert!(out.contains("- **ADSL + ADLB**"));
        assert!(out.contains("- **ADSL + ADVS**"));
    }

    #[tokio::test]
    async fn incompatible_markdown_carries_guidance() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_t_ancova", Some(&["ADSL", "ADAE"])))
            .await
            .unwrap();
        assert!(out.contains("❌ **Incompatible** - Missing required datasets"));
        assert!(out.contains("**Missing Datasets**: BDS_CONTINUOUS"));
        assert!(out.contains("This module needs a BDS dataset with continuous AVAL."));
        assert!(out.contains("**Suggestion**: Use tealflow_get_dataset_info"));
        assert!(!out.contains("## Compatible Dataset Combinations"));
    }

    #[tokio::test]
    async fn default_available_list_applies_when_omitted() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_g_km", None)).await.unwrap();
        assert!(out.contains("**Available Datasets**: ADSL, ADTTE, ADRS, ADQS, ADAE"));
        assert!(out.contains("✅ **Compatible**"));
    }

    #[tokio::test]
    async fn no_requirements_takes_short_form() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_data_table", Some(&["ANYTHING"])))
            .await
            .unwrap();
        assert!(out.contains(
            "This module works with any data.frame and has no specific dataset requirements."
        ));
        assert!(!out.contains("## Details"));
    }

    #[tokio::test]
    async fn no_requirements_json_short_form() {
        let ctx = testing::context();
        let mut p = params("tm_data_table", Some(&["ADSL"]));
        p.response_format = ResponseFormat::Json;
        let out = run(&ctx, p).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["compatible"], true);
        assert_eq!(parsed["required_datasets"].as_array().unwrap().len(), 0);
        assert!(parsed.get("compatible_combinations").is_none());
    }

    #[tokio::test]
    async fn json_report_uses_wire_field_names() {
        let ctx = testing::context();
        let mut p = params("tm_t_ancova", Some(&["ADSL", "ADLB"]));
        p.response_format = ResponseFormat::Json;
        let out = run(&ctx, p).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["compatible"], true);
        assert_eq!(parsed["compatible_combinations"][0], "ADSL + ADLB");
        assert_eq!(parsed["matched_datasets"]["BDS_CONTINUOUS"][0], "ADLB");
        assert_eq!(parsed["matched_datasets"]["ADSL"][0], "ADSL");
    }

    #[tokio::test]
    async fn unknown_module_gets_suggestion_without_listing_pointer() {
        let ctx = testing::context();
        let out = run(&ctx, params("tm_g_kma", None)).await.unwrap();
        assert_eq!(
            out,
            "Error: Module 'tm_g_kma' not found. Did you mean 'tm_g_km'?"
        );
    }
}
