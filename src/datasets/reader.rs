//! Dataset file inspection.
//!
//! CSV files are read directly; RDS files go through the R interpreter.
//! Column types use R's vocabulary (`character`, `numeric`, `integer`) so
//! both paths report the same thing for the same data.

use crate::error::{Result, TealflowError};
use crate::rscript::RScriptRunner;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const MAX_SAMPLE_VALUES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub sample_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub row_count: u64,
    pub file_size_bytes: u64,
    pub columns: Vec<ColumnInfo>,
}

impl DatasetSummary {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Inspect a dataset file, dispatching on its extension.
pub async fn read_dataset_info(
    path: &Path,
    runner: &dyn RScriptRunner,
    timeout: Duration,
) -> Result<DatasetSummary> {
    if !path.is_file() {
        return Err(TealflowError::Tool {
            message: format!("Dataset file not found: {}", path.display()),
        });
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => read_csv_info(path),
        "rds" => read_rds_info(path, runner, timeout).await,
        other => Err(TealflowError::Tool {
            message: format!(
                "Unsupported file format: .{}. Supported formats: .rds, .csv",
                other
            ),
        }),
    }
}

fn read_csv_info(path: &Path) -> Result<DatasetSummary> {
    let file_size_bytes = fs::metadata(path)?.len();
    let content = fs::read_to_string(path)?;
    let mut records = parse_csv(&content);
    // Drop blank lines that parse as a single empty field
    records.retain(|r| !(r.len() == 1 && r[0].is_empty()));

    if records.is_empty() {
        return Ok(DatasetSummary {
            row_count: 0,
            file_size_bytes,
            columns: Vec::new(),
        });
    }

    let header = records.remove(0);
    let mut columns = Vec::with_capacity(header.len());
    for (idx, name) in header.into_iter().enumerate() {
        let values: Vec<&str> = records
            .iter()
            .map(|r| r.get(idx).map(|v| v.as_str()).unwrap_or(""))
            .collect();
        let column_type = infer_column_type(&values);
        let samples = sample_values(&values);
        columns.push(ColumnInfo {
            name,
            column_type: column_type.to_string(),
            sample_values: if samples.is_empty() { None } else { Some(samples) },
        });
    }

    Ok(DatasetSummary {
        row_count: records.len() as u64,
        file_size_bytes,
        columns,
    })
}

/// Minimal CSV record parser: quoted fields, doubled-quote escapes,
/// embedded newlines inside quotes, CRLF line endings.
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Decide a column's R type from its cell syntax. Empty cells are missing
/// and do not vote; a column of only missing cells is `character`.
fn infer_column_type(values: &[&str]) -> &'static str {
    let mut saw_value = false;
    let mut all_integral = true;
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        saw_value = true;
        match value.parse::<f64>() {
            Ok(n) => {
                if !n.is_finite() || n.fract() != 0.0 {
                    all_integral = false;
                }
            }
            Err(_) => return "character",
        }
    }
    if !saw_value {
        "character"
    } else if all_integral {
        "integer"
    } else {
        "numeric"
    }
}

/// First few unique non-missing values, in order of appearance.
fn sample_values(values: &[&str]) -> Vec<String> {
    let mut samples: Vec<String> = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() || samples.iter().any(|s| s == value) {
            continue;
        }
        samples.push(value.to_string());
        if samples.len() == MAX_SAMPLE_VALUES {
            break;
        }
    }
    samples
}

async fn read_rds_info(
    path: &Path,
    runner: &dyn RScriptRunner,
    timeout: Duration,
) -> Result<DatasetSummary> {
    let file_size_bytes = fs::metadata(path)?.len();
    let expression = format!(
        "df <- readRDS({path}); stopifnot(is.data.frame(df)); \
         cat(\"ROWS\", nrow(df), \"\\n\"); cat(\"COLS\", ncol(df), \"\\n\"); \
         for (n in names(df)) {{ v <- df[[n]]; s <- utils::head(unique(v[!is.na(v)]), {max}); \
         cat(\"COL\", n, class(v)[1], paste(s, collapse = \"|\"), sep = \"\\t\"); cat(\"\\n\") }}",
        path = r_string_literal(path),
        max = MAX_SAMPLE_VALUES
    );
    let output = runner.run_expression(&expression, None, timeout).await?;
    if output.timed_out {
        return Err(TealflowError::Tool {
            message: format!("Timed out reading RDS file: {}", path.display()),
        });
    }
    if !output.success() {
        let reason = output
            .stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("unknown error");
        return Err(TealflowError::Tool {
            message: format!("Invalid RDS file: {}: {}", path.display(), reason),
        });
    }
    parse_rds_metadata(&output.stdout, file_size_bytes).ok_or_else(|| TealflowError::Tool {
        message: format!(
            "Invalid RDS file: {}: unexpected interpreter output",
            path.display()
        ),
    })
}

fn r_string_literal(path: &Path) -> String {
    let escaped = path
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn parse_rds_metadata(stdout: &str, file_size_bytes: u64) -> Option<DatasetSummary> {
    let mut row_count: Option<u64> = None;
    let mut columns = Vec::new();
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("ROWS") {
            row_count = rest.trim().parse().ok();
        } else if let Some(rest) = line.strip_prefix("COL\t") {
            let mut parts = rest.splitn(3, '\t');
            let name = parts.next()?.to_string();
            let column_type = parts.next()?.to_string();
            let samples: Vec<String> = parts
                .next()
                .unwrap_or("")
                .split('|')
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            columns.push(ColumnInfo {
                name,
                column_type,
                sample_values: if samples.is_empty() { None } else { Some(samples) },
            });
        }
    }
    Some(DatasetSummary {
        row_count: row_count?,
        file_size_bytes,
        columns,
    })
}
