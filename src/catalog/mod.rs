pub mod loader;
pub mod similarity;

use crate::constants;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use similarity::StringUtils;

/// Which package family a module ships in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Clinical,
    General,
}

impl PackageKind {
    pub fn full_package_name(&self) -> &'static str {
        match self {
            PackageKind::Clinical => "teal.modules.clinical",
            PackageKind::General => "teal.modules.general",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Clinical => "clinical",
            PackageKind::General => "general",
        }
    }
}

/// Caller-facing package filter for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFilter {
    #[default]
    All,
    Clinical,
    General,
}

impl PackageFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageFilter::All => "all",
            PackageFilter::Clinical => "clinical",
            PackageFilter::General => "general",
        }
    }

    pub fn accepts(&self, kind: PackageKind) -> bool {
        match self {
            PackageFilter::All => true,
            PackageFilter::Clinical => kind == PackageKind::Clinical,
            PackageFilter::General => kind == PackageKind::General,
        }
    }
}

/// The known flexible dataset categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryTag {
    BdsDataset,
    BdsContinuous,
    BdsBinary,
}

impl CategoryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryTag::BdsDataset => constants::BDS_DATASET_TAG,
            CategoryTag::BdsContinuous => constants::BDS_CONTINUOUS_TAG,
            CategoryTag::BdsBinary => constants::BDS_BINARY_TAG,
        }
    }

    pub fn members(&self) -> &'static [&'static str] {
        match self {
            CategoryTag::BdsDataset => constants::BDS_DATASETS,
            CategoryTag::BdsContinuous => constants::BDS_CONTINUOUS_DATASETS,
            CategoryTag::BdsBinary => constants::BDS_BINARY_DATASETS,
        }
    }

    pub fn contains(&self, dataset: &str) -> bool {
        self.members().contains(&dataset)
    }
}

/// One declared dataset requirement, parsed once at catalog load.
///
/// Category syntax (`BDS_` prefix) with an unknown tag parses to
/// `UnknownCategory`, which never matches anything; every other string is an
/// exact dataset name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementToken {
    Exact(String),
    Category(CategoryTag),
    UnknownCategory(String),
}

impl RequirementToken {
    pub fn parse(raw: &str) -> Self {
        match raw {
            constants::BDS_DATASET_TAG => RequirementToken::Category(CategoryTag::BdsDataset),
            constants::BDS_CONTINUOUS_TAG => {
                RequirementToken::Category(CategoryTag::BdsContinuous)
            }
            constants::BDS_BINARY_TAG => RequirementToken::Category(CategoryTag::BdsBinary),
            other if constants::looks_like_category_tag(other) => {
                RequirementToken::UnknownCategory(other.to_string())
            }
            other => RequirementToken::Exact(other.to_string()),
        }
    }

    /// The declared form, as it appears in module data and rendered output.
    pub fn display(&self) -> &str {
        match self {
            RequirementToken::Exact(id) => id,
            RequirementToken::Category(tag) => tag.as_str(),
            RequirementToken::UnknownCategory(tag) => tag,
        }
    }

    /// Flexible requirements admit more than one satisfying dataset.
    pub fn is_flexible(&self) -> bool {
        matches!(self, RequirementToken::Category(_))
    }

    /// Whether one available dataset satisfies this requirement.
    /// Exact matches are case-sensitive.
    pub fn matches(&self, dataset: &str) -> bool {
        match self {
            RequirementToken::Exact(id) => id == dataset,
            RequirementToken::Category(tag) => tag.contains(dataset),
            RequirementToken::UnknownCategory(_) => false,
        }
    }
}

/// Metadata for one module function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
}

/// Required and defaulted parameters of a module's R function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleParameters {
    #[serde(default)]
    pub required_params: BTreeMap<String, ParameterSpec>,
    #[serde(default)]
    pub params_with_defaults: BTreeMap<String, serde_json::Value>,
}

/// One catalog entry: an analysis module with its dataset requirements.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub name: String,
    pub package: PackageKind,
    pub description: String,
    pub required_capabilities: Vec<RequirementToken>,
    pub typical_identifiers: Vec<String>,
    /// Per-requirement explanatory text keyed by the declared string,
    /// surfaced as-is in compatibility reports.
    pub dataset_requirements: BTreeMap<String, String>,
    pub notes: String,
    pub parameters: ModuleParameters,
}

impl ModuleRecord {
    /// Declared requirement strings in declaration order.
    pub fn required_display(&self) -> Vec<String> {
        self.required_capabilities
            .iter()
            .map(|t| t.display().to_string())
            .collect()
    }

    /// Patient-profile modules take a reduced code-generation form.
    pub fn is_patient_profile(&self) -> bool {
        self.name.starts_with("tm_g_pp_") || self.name.starts_with("tm_t_pp_")
    }
}

/// One analysis category from the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCategory {
    pub name: String,
    pub package: PackageKind,
    pub description: String,
    pub modules: Vec<String>,
}

/// Process-lifetime module index. Built once at startup, immutable after.
pub struct Catalog {
    modules: HashMap<String, ModuleRecord>,
    /// Module names sorted for deterministic listings and suggestions.
    names: Vec<String>,
    categories: Vec<AnalysisCategory>,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
    similarity_cutoff: f64,
}

impl Catalog {
    pub(crate) fn from_parts(
        records: Vec<ModuleRecord>,
        categories: Vec<AnalysisCategory>,
        fingerprint: String,
        similarity_cutoff: f64,
    ) -> Self {
        let mut modules = HashMap::with_capacity(records.len());
        let mut names = Vec::with_capacity(records.len());
        for record in records {
            names.push(record.name.clone());
            modules.insert(record.name.clone(), record);
        }
        names.sort();
        Self {
            modules,
            names,
            categories,
            fingerprint,
            loaded_at: Utc::now(),
            similarity_cutoff,
        }
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules.get(name)
    }

    /// Filtered listing, sorted by module name.
    pub fn list(&self, package: PackageFilter, text: Option<&str>) -> Vec<&ModuleRecord> {
        let needle = text.map(|t| t.to_lowercase());
        self.names
            .iter()
            .filter_map(|name| self.modules.get(name))
            .filter(|record| package.accepts(record.package))
            .filter(|record| match &needle {
                Some(needle) => {
                    record.name.to_lowercase().contains(needle)
                        || record.description.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect()
    }

    /// Closest catalog name to an unmatched input, at most one suggestion.
    /// Only used to improve not-found messages, never to substitute names.
    pub fn find_similar(&self, name: &str) -> Option<&str> {
        StringUtils::closest_match(
            name,
            self.names.iter().map(|s| s.as_str()),
            self.similarity_cutoff,
        )
    }

    pub fn module_names(&self) -> &[String] {
        &self.names
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn categories(&self) -> &[AnalysisCategory] {
        &self.categories
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
pub(crate) fn test_record(
    name: &str,
    package: PackageKind,
    description: &str,
    requirements: &[&str],
) -> ModuleRecord {
    ModuleRecord {
        name: name.to_string(),
        package,
        description: description.to_string(),
        required_capabilities: requirements.iter().map(|r| RequirementToken::parse(r)).collect(),
        typical_identifiers: Vec::new(),
        dataset_requirements: BTreeMap::new(),
        notes: String::new(),
        parameters: ModuleParameters::default(),
    }
}
