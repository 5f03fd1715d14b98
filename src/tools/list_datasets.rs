//! Static reference list of the standard study datasets.

use super::AppContext;
use crate::error::Result;
use crate::render::ResponseFormat;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    pub response_format: ResponseFormat,
}

struct DatasetEntry {
    name: &'static str,
    full_name: &'static str,
    description: &'static str,
    usage: &'static str,
    kind: &'static str,
    key_modules: &'static [&'static str],
}

/// Reference data for the five standard datasets, with usage statistics for
/// the shipped module catalog.
const DATASET_ENTRIES: &[DatasetEntry] = &[
    DatasetEntry {
        name: "ADSL",
        full_name: "Subject-Level Analysis Dataset",
        description: "Contains one record per subject with demographic and baseline \
                      characteristics. This is the primary parent dataset used by most \
                      clinical modules.",
        usage: "Used in 19/19 clinical modules (100%)",
        kind: "Parent dataset",
        key_modules: &[],
    },
    DatasetEntry {
        name: "ADTTE",
        full_name: "Time-to-Event Analysis Dataset",
        description: "Contains time-to-event data for survival analysis including event \
                      times and censoring information.",
        usage: "Used in 4 clinical modules (21%)",
        kind: "Analysis dataset",
        key_modules: &["tm_g_km", "tm_g_forest_tte", "tm_t_coxreg", "tm_t_tte"],
    },
    DatasetEntry {
        name: "ADRS",
        full_name: "Response Analysis Dataset",
        description: "Contains tumor response data and endpoints for efficacy analysis.",
        usage: "Used in 3 clinical modules (16%)",
        kind: "Analysis dataset",
        key_modules: &["tm_g_forest_rsp", "tm_t_binary_outcome", "tm_t_logistic"],
    },
    DatasetEntry {
        name: "ADQS",
        full_name: "Questionnaire Analysis Dataset",
        description: "Contains patient-reported outcome and quality of life questionnaire \
                      data.",
        usage: "Used in 3 clinical modules",
        kind: "Analysis dataset",
        key_modules: &["tm_t_ancova", "tm_a_gee", "tm_a_mmrm"],
    },
    DatasetEntry {
        name: "ADAE",
        full_name: "Adverse Events Analysis Dataset",
        description: "Contains adverse event data including severity, relationship, and \
                      outcome information.",
        usage: "Used in 4 clinical modules (21%)",
        kind: "Analysis dataset",
        key_modules: &[
            "tm_g_barchart_simple",
            "tm_g_pp_adverse_events",
            "tm_t_events",
            "tm_t_events_by_grade",
        ],
    },
];

pub async fn run(_ctx: &AppContext, params: Params) -> Result<String> {
    Ok(match params.response_format {
        ResponseFormat::Markdown => {
            let mut lines: Vec<String> =
                vec!["# Clinical Trial Datasets in TealFlow".to_string(), String::new()];
            lines.push(
                "These are the standard ADaM datasets available in the TealFlow project \
                 following CDISC standards."
                    .to_string(),
            );
            lines.push(String::new());

            for entry in DATASET_ENTRIES {
                lines.push(format!("## {} - {}", entry.name, entry.full_name));
                lines.push(format!("**Type**: {}", entry.kind));
                lines.push(format!("**Description**: {}", entry.description));
                lines.push(format!("**Usage**: {}", entry.usage));
                if !entry.key_modules.is_empty() {
                    let shown: Vec<&str> = entry.key_modules.iter().take(4).copied().collect();
                    lines.push(format!("**Key Modules**: {}", shown.join(", ")));
                }
                lines.push(String::new());
            }

            lines.join("\n")
        }
        ResponseFormat::Json => {
            let datasets: Vec<Value> = DATASET_ENTRIES
                .iter()
                .map(|entry| {
                    let mut obj = Map::new();
                    obj.insert("name".to_string(), json!(entry.name));
                    obj.insert("full_name".to_string(), json!(entry.full_name));
                    obj.insert("description".to_string(), json!(entry.description));
                    obj.insert("usage".to_string(), json!(entry.usage));
                    obj.insert("type".to_string(), json!(entry.kind));
                    if !entry.key_modules.is_empty() {
                        obj.insert("modules".to_string(), json!(entry.key_modules));
                    }
                    Value::Object(obj)
                })
                .collect();
            let payload = json!({ "datasets": datasets, "count": DATASET_ENTRIES.len() });
            serde_json::to_string_pretty(&payload)?
        }
    })
}
