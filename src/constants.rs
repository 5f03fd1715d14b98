//! ADaM dataset names and BDS category memberships used by the catalog
//! and the compatibility resolver.

// Flexible requirement category tags (as they appear in module data)
pub const BDS_DATASET_TAG: &str = "BDS_DATASET";
pub const BDS_CONTINUOUS_TAG: &str = "BDS_CONTINUOUS";
pub const BDS_BINARY_TAG: &str = "BDS_BINARY";

// Category memberships. Narrow sets are subsets of the broad BDS set.
pub const BDS_DATASETS: &[&str] = &["ADLB", "ADVS", "ADQS", "ADEG", "ADEX", "ADRS"];
pub const BDS_CONTINUOUS_DATASETS: &[&str] = &["ADLB", "ADVS", "ADQS", "ADEG", "ADEX"];
pub const BDS_BINARY_DATASETS: &[&str] = &["ADRS"];

// Standard ADaM dataset names recognized during filename-based discovery
pub const STANDARD_ADAM_DATASETS: &[&str] = &[
    "ADSL", "ADTTE", "ADRS", "ADQS", "ADAE", "ADLB", "ADVS", "ADCM", "ADEX", "ADMH",
];

// Default availability assumed when a caller does not list their datasets
pub const DEFAULT_AVAILABLE_DATASETS: &[&str] = &["ADSL", "ADTTE", "ADRS", "ADQS", "ADAE"];

// R packages installed by the environment setup tool
pub const REQUIRED_R_PACKAGES: &[&str] =
    &["shiny", "teal", "teal.modules.general", "teal.modules.clinical"];

/// Maximum characters in a rendered tool response before truncation
pub const CHARACTER_LIMIT: usize = 25_000;

/// Similarity cutoff for nearest-name suggestions on unknown module names
pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 0.6;

/// Default wall-clock budget for one-off Rscript invocations
pub const DEFAULT_RSCRIPT_TIMEOUT_SECS: u64 = 300;

/// Wall-clock budget for the package installation step of environment setup
pub const PACKAGE_INSTALL_TIMEOUT_SECS: u64 = 600;

/// Expand a standard ADaM dataset name to its full title
pub fn dataset_full_name(name: &str) -> String {
    match name {
        "ADSL" => "Subject-Level Analysis Dataset".to_string(),
        "ADTTE" => "Time-to-Event Analysis Dataset".to_string(),
        "ADRS" => "Response Analysis Dataset".to_string(),
        "ADQS" => "Questionnaire Analysis Dataset".to_string(),
        "ADAE" => "Adverse Events Analysis Dataset".to_string(),
        "ADLB" => "Laboratory Analysis Dataset".to_string(),
        "ADVS" => "Vital Signs Analysis Dataset".to_string(),
        "ADCM" => "Concomitant Medications Analysis Dataset".to_string(),
        "ADEX" => "Exposure Analysis Dataset".to_string(),
        "ADMH" => "Medical History Analysis Dataset".to_string(),
        other => other.to_string(),
    }
}

/// Get all category tags the resolver understands
pub fn get_known_category_tags() -> Vec<&'static str> {
    vec![BDS_DATASET_TAG, BDS_CONTINUOUS_TAG, BDS_BINARY_TAG]
}

/// Membership list for a known category tag, None for unknown tags
pub fn category_members(tag: &str) -> Option<&'static [&'static str]> {
    match tag {
        BDS_DATASET_TAG => Some(BDS_DATASETS),
        BDS_CONTINUOUS_TAG => Some(BDS_CONTINUOUS_DATASETS),
        BDS_BINARY_TAG => Some(BDS_BINARY_DATASETS),
        _ => None,
    }
}

/// True when a requirement string is declared in category syntax, known or not
pub fn looks_like_category_tag(token: &str) -> bool {
    token.starts_with("BDS_")
        && token.len() > 4
        && token.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}
