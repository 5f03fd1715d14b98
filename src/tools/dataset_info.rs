//! Dataset file inspection tool.

use super::AppContext;
use crate::datasets::reader::{read_dataset_info, ColumnInfo, DatasetSummary};
use crate::error::{Result, TealflowError};
use crate::render::{format_file_size, ResponseFormat};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Params {
    pub file_path: String,
    #[serde(default = "default_true")]
    pub include_sample_values: bool,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

fn default_true() -> bool {
    true
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let path = Path::new(&params.file_path);
    if !path.is_absolute() {
        return Err(TealflowError::InvalidParameter(format!(
            "File path must be absolute, not relative. Received: {}",
            params.file_path
        )));
    }

    let mut summary =
        read_dataset_info(path, ctx.rscript.as_ref(), ctx.rscript_timeout()).await?;
    if !params.include_sample_values {
        for column in &mut summary.columns {
            column.sample_values = None;
        }
    }

    Ok(match params.response_format {
        ResponseFormat::Markdown => {
            render_markdown(path, &summary, params.include_sample_values)
        }
        ResponseFormat::Json => {
            let payload = json!({
                "file_path": params.file_path,
                "row_count": summary.row_count,
                "column_count": summary.column_count(),
                "file_size_bytes": summary.file_size_bytes,
                "columns": summary.columns,
            });
            serde_json::to_string_pretty(&payload)?
        }
    })
}

fn render_markdown(path: &Path, summary: &DatasetSummary, include_samples: bool) -> String {
    let mut lines: Vec<String> = vec!["# Dataset Information".to_string(), String::new()];
    lines.push(format!("**File**: `{}`", path.display()));
    lines.push(format!("**Rows**: {}", group_thousands(summary.row_count)));
    lines.push(format!("**Columns**: {}", summary.column_count()));
    lines.push(format!(
        "**File Size**: {}",
        format_file_size(summary.file_size_bytes)
    ));
    lines.push(String::new());

    lines.push("## Columns".to_string());
    lines.push(String::new());

    if include_samples {
        for (i, column) in summary.columns.iter().enumerate() {
            lines.push(format!("### {}. {}", i + 1, column.name));
            lines.push(format!("- **Type**: `{}`", column.column_type));
            if let Some(samples) = sample_list(column) {
                lines.push(format!("- **Sample Values**: {}", samples));
            }
            lines.push(String::new());
        }
    } else {
        lines.push("| # | Column Name | Type |".to_string());
        lines.push("|---|-------------|------|".to_string());
        for (i, column) in summary.columns.iter().enumerate() {
            lines.push(format!(
                "| {} | `{}` | `{}` |",
                i + 1,
                column.name,
                column.column_type
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn sample_list(column: &ColumnInfo) -> Option<String> {
    let samples = column.sample_values.as_ref()?;
    if samples.is_empty() {
        return None;
    }
    Some(
        samples
            .iter()
            .map(|v| format!("`{}`", v))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Thousands-grouped row counts for the markdown summary.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "USUBJID,AGE,AVAL").unwrap();
        writeln!(f, "S1,34,1.5").unwrap();
        writeln!(f, "S2,41,2.25").unwrap();
        f.flush().unwrap();
        path
    }

    fn params(path: &Path) -> Params {
        Params {
            file_path: path.to_string_lossy().into_owned(),
            include_sample_values: true,
            response_format: ResponseFormat::Markdown,
        }
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[tokio::test]
    async fn relative_paths_are_rejected() {
        let ctx = testing::context();
        let err = run(&ctx, params(Path::new("data/ADSL.csv"))).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("File path must be absolute, not relative. Received: data/ADSL.csv"));
    }

    #[tokio::test]
    async fn markdown_with_samples_sections_per_column() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "ADSL.csv");

        let ctx = testing::context();
        let out = run(&ctx, params(&path)).await.unwrap();
        assert!(out.starts_with("# Dataset Information"));
        assert!(out.contains("**Rows**: 2"));
        assert!(out.contains("**Columns**: 3"));
        assert!(out.contains("### 1. USUBJID"));
        assert!(out.contains("- **Type**: `character`"));
        assert!(out.contains("- **Sample Values**: `S1`, `S2`"));
    }

    #[tokio::test]
    async fn markdown_without_samples_renders_table() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "ADSL.csv");

        let ctx = testing::context();
        let mut p = params(&path);
        p.include_sample_values = false;
        let out = run(&ctx, p).await.unwrap();
        assert!(out.contains("| # | Column Name | Type |"));
        assert!(out.contains("| 1 | `USUBJID` | `character` |"));
        assert!(out.contains("| 2 | `AGE` | `integer` |"));
        assert!(out.contains("| 3 | `AVAL` | `numeric` |"));
        assert!(!out.contains("Sample Values"));
    }

    #[tokio::test]
    async fn json_strips_samples_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let path = write_csv(&tmp, "ADSL.csv");

        let ctx = testing::context();
        let mut p = params(&path);
        p.include_sample_values = false;
        p.response_format = ResponseFormat::Json;
        let out = run(&ctx, p).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["row_count"], 2);
        assert_eq!(parsed["column_count"], 3);
        assert_eq!(parsed["columns"][0]["type"], "character");
        assert!(parsed["columns"][0]["sample_values"].is_null());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let ctx = testing::context();
        let err = run(&ctx, params(Path::new("/no/such/ADSL.csv"))).await.unwrap_err();
        assert!(err.to_string().contains("Dataset file not found"));
    }
}
