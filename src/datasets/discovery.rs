//! Filename-based ADaM dataset discovery.
//!
//! Scans one directory level for `.Rds`/`.csv` files and extracts the dataset
//! name from each filename. Standard names are recognized case-insensitively
//! anywhere in the filename as long as they are not embedded in a longer
//! word; all-uppercase `AD...` tokens count as custom datasets.

use crate::constants::STANDARD_ADAM_DATASETS;
use crate::error::{Result, TealflowError};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const SUPPORTED_FORMATS: &[&str] = &["Rds", "csv"];

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDataset {
    pub name: String,
    pub path: String,
    pub format: String,
    pub is_standard_adam: bool,
    pub size_bytes: u64,
    pub readable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResult {
    pub status: String,
    pub data_directory: String,
    pub datasets_found: Vec<DiscoveredDataset>,
    pub count: usize,
    pub supported_formats: Vec<String>,
    pub warnings: Vec<String>,
}

/// Scan a directory for ADaM dataset files. `format_filter` limits results
/// to the named formats (case-insensitive); `None` accepts all supported.
pub fn discover_datasets(
    data_directory: &Path,
    format_filter: Option<&[String]>,
) -> Result<DiscoveryResult> {
    if !data_directory.is_dir() {
        return Err(TealflowError::Tool {
            message: format!(
                "Data directory does not exist: {}",
                data_directory.display()
            ),
        });
    }

    let mut datasets = Vec::new();
    let mut warnings = Vec::new();
    for entry in fs::read_dir(data_directory)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let format = match dataset_format(&path) {
            Some(format) => format,
            None => continue,
        };
        if let Some(filter) = format_filter {
            if !filter.iter().any(|f| f.eq_ignore_ascii_case(format)) {
                continue;
            }
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem,
            None => continue,
        };
        let (name, is_standard) = match extract_dataset_name(stem) {
            Some(found) => found,
            None => continue,
        };

        let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let readable = fs::File::open(&path).is_ok();
        if !readable {
            warnings.push(format!("File is not readable: {}", path.display()));
        }
        datasets.push(DiscoveredDataset {
            name: name.to_string(),
            path: path.display().to_string(),
            format: format.to_string(),
            is_standard_adam: is_standard,
            size_bytes,
            readable,
        });
    }

    datasets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(DiscoveryResult {
        status: "success".to_string(),
        data_directory: data_directory.display().to_string(),
        count: datasets.len(),
        datasets_found: datasets,
        supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        warnings,
    })
}

fn dataset_format(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?;
    if extension.eq_ignore_ascii_case("rds") {
        Some("Rds")
    } else if extension.eq_ignore_ascii_case("csv") {
        Some("csv")
    } else {
        None
    }
}

/// Extract the dataset name from a file stem. Returns the name and whether it
/// is a standard ADaM dataset.
fn extract_dataset_name(stem: &str) -> Option<(String, bool)> {
    if let Some(standard) = extract_standard_name(stem) {
        return Some((standard.to_string(), true));
    }
    extract_custom_name(stem).map(|custom| (custom, false))
}

/// Leftmost standard ADaM name, matched case-insensitively, with no letter
/// directly before or after it (digits and punctuation are fine boundaries).
pub(crate) fn extract_standard_name(stem: &str) -> Option<&'static str> {
    let lower: Vec<char> = stem.to_lowercase().chars().collect();
    for start in 0..lower.len() {
        if start > 0 && lower[start - 1].is_ascii_alphabetic() {
            continue;
        }
        for name in STANDARD_ADAM_DATASETS {
            let name_chars: Vec<char> = name.to_lowercase().chars().collect();
            let end = start + name_chars.len();
            if end > lower.len() || lower[start..end] != name_chars[..] {
                continue;
            }
            if end < lower.len() && lower[end].is_ascii_alphabetic() {
                continue;
            }
            return Some(name);
        }
    }
    None
}

/// All-uppercase letter token starting with `AD`, longer than two characters,
/// that is not a standard name. Lowercase words like `advanced` never match.
pub(crate) fn extract_custom_name(stem: &str) -> Option<String> {
    for token in stem.split(|c: char| !c.is_ascii_alphabetic()) {
        if token.len() > 2
            && token.starts_with("AD")
            && token.chars().all(|c| c.is_ascii_uppercase())
            && !STANDARD_ADAM_DATASETS.contains(&token)
        {
            return Some(token.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), b"x").unwrap();
    }

    #[test]
    fn discovers_rds_and_csv_files() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "ADSL.Rds");
        touch(&tmp, "ADTTE.csv");
        touch(&tmp, "ADAE.Rds");

        let result = discover_datasets(tmp.path(), None).unwrap();
        assert_eq!(result.status, "success");
        assert_eq!(result.count, 3);
        let formats: Vec<&str> = result
            .datasets_found
            .iter()
            .map(|d| d.format.as_str())
            .collect();
        assert!(formats.contains(&"Rds"));
        assert!(formats.contains(&"csv"));
    }

    #[test]
    fn ignores_non_dataset_files() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "ADSL.Rds");
        touch(&tmp, "README.md");
        touch(&tmp, "data.txt");
        touch(&tmp, "config.json");

        let result = discover_datasets(tmp.path(), None).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.datasets_found[0].name, "ADSL");
    }

    #[test]
    fn distinguishes_standard_from_custom() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "ADSL.Rds");
        touch(&tmp, "ADCUSTOM.Rds");

        let result = discover_datasets(tmp.path(), None).unwrap();
        assert_eq!(result.count, 2);
        for dataset in &result.datasets_found {
            match dataset.name.as_str() {
                "ADSL" => assert!(dataset.is_standard_adam),
                "ADCUSTOM" => assert!(!dataset.is_standard_adam),
                other => panic!("unexpected dataset {}", other),
            }
        }
    }

    #[test]
    fn extracts_names_from_complex_filenames() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "project123_ADSL_2024-01-15.Rds");
        touch(&tmp, "drugX_ADTTE_final.csv");
        touch(&tmp, "ADAE_v2_locked.Rds");
        touch(&tmp, "study_abc_ADRS.csv");

        let result = discover_datasets(tmp.path(), None).unwrap();
        assert_eq!(result.count, 4);
        let names: Vec<&str> = result
            .datasets_found
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["ADAE", "ADRS", "ADSL", "ADTTE"]);
    }

    #[test]
    fn matching_is_case_insensitive_and_normalizes() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "adsl.Rds");
        touch(&tmp, "AdTtE.csv");
        touch(&tmp, "project_adrs_final.csv");

        let result = discover_datasets(tmp.path(), None).unwrap();
        let names: Vec<&str> = result
            .datasets_found
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["ADRS", "ADSL", "ADTTE"]);
    }

    #[test]
    fn avoids_false_positives_on_ad_words() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "admin_notes.csv");
        touch(&tmp, "advanced_analysis.Rds");
        touch(&tmp, "ADSL.Rds");

        let result = discover_datasets(tmp.path(), None).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.datasets_found[0].name, "ADSL");
    }

    #[test]
    fn empty_directory_is_success_with_no_findings() {
        let tmp = TempDir::new().unwrap();
        let result = discover_datasets(tmp.path(), None).unwrap();
        assert_eq!(result.count, 0);
        assert!(result.datasets_found.is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = discover_datasets(Path::new("/path/that/does/not/exist"), None).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn format_filter_selects_one_format() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp, "ADSL.Rds");
        touch(&tmp, "ADTTE.csv");

        let filter = vec!["Rds".to_string()];
        let result = discover_datasets(tmp.path(), Some(&filter)).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.datasets_found[0].format, "Rds");
    }

    #[test]
    fn results_carry_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ADSL.Rds"), b"test data").unwrap();

        let result = discover_datasets(tmp.path(), None).unwrap();
        let dataset = &result.datasets_found[0];
        assert_eq!(dataset.name, "ADSL");
        assert_eq!(dataset.format, "Rds");
        assert!(dataset.size_bytes > 0);
        assert!(dataset.readable);
    }

    #[test]
    fn standard_name_extraction_rules() {
        assert_eq!(extract_standard_name("123ADSL456"), Some("ADSL"));
        assert_eq!(extract_standard_name("project.ADSL.final"), Some("ADSL"));
        assert_eq!(extract_standard_name("AdSl"), Some("ADSL"));
        assert_eq!(extract_standard_name("PROJECTADSL"), None);
        assert_eq!(extract_standard_name("ADSL_vs_ADTTE_comparison"), Some("ADSL"));
        assert_eq!(extract_standard_name("ADFOO"), None);
    }

    #[test]
    fn custom_name_extraction_rules() {
        assert_eq!(extract_custom_name("ADCUSTOM"), Some("ADCUSTOM".to_string()));
        assert_eq!(extract_custom_name("advanced_analysis"), None);
        assert_eq!(extract_custom_name("admin"), None);
        assert_eq!(extract_custom_name("AD"), None);
    }
}
