use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::catalog::{ModuleRecord, RequirementToken};

/// Separator used when joining dataset ids into a combination string
pub const COMBINATION_SEPARATOR: &str = " + ";

/// How combinations are enumerated when several flexible requirements match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationMode {
    /// Vary one flexible requirement at a time, exact ids held fixed.
    /// Mirrors the advisory output users already know and keeps the list
    /// short when flexible groups are large.
    #[default]
    SingleAxis,
    /// Enumerate the full cross-product over flexible requirements.
    CartesianProduct,
}

impl CombinationMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single-axis" => Some(CombinationMode::SingleAxis),
            "cartesian-product" => Some(CombinationMode::CartesianProduct),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CombinationMode::SingleAxis => "single-axis",
            CombinationMode::CartesianProduct => "cartesian-product",
        }
    }
}

/// One satisfied requirement with the datasets that satisfy it,
/// in the order they appeared in the caller's available list.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRequirement {
    pub requirement: String,
    pub datasets: Vec<String>,
}

/// Structured outcome of a compatibility check.
///
/// Field order and content are deterministic for identical inputs; there is
/// no timestamp or other per-call state in the report. Serialized field
/// names follow the wire contract of the check tool's JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityReport {
    pub module_name: String,
    pub compatible: bool,
    /// Concrete dataset pick-lists that satisfy every requirement.
    #[serde(rename = "compatible_combinations")]
    pub combinations: Vec<String>,
    /// Declared requirement strings in declaration order.
    #[serde(rename = "required_datasets")]
    pub required: Vec<String>,
    /// Example datasets for flexible requirements, pass-through metadata.
    #[serde(rename = "typical_datasets")]
    pub typical: Vec<String>,
    /// The caller's available list, exactly as given.
    #[serde(rename = "available_datasets")]
    pub available: Vec<String>,
    /// Unsatisfied requirement strings in declaration order.
    #[serde(rename = "missing_datasets")]
    pub missing: Vec<String>,
    /// Satisfied requirements in declaration order.
    #[serde(rename = "matched_datasets", serialize_with = "matched_as_map")]
    pub matched: Vec<MatchedRequirement>,
    /// Per-requirement explanatory text keyed by the declared string.
    #[serde(rename = "dataset_requirements")]
    pub details: BTreeMap<String, String>,
    pub notes: String,
}

/// Serialize matched requirements as a JSON object keyed by requirement,
/// preserving declaration order.
fn matched_as_map<S: Serializer>(
    matched: &[MatchedRequirement],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(matched.len()))?;
    for entry in matched {
        map.serialize_entry(&entry.requirement, &entry.datasets)?;
    }
    map.end()
}

impl CompatibilityReport {
    /// Matched datasets for one requirement string, if satisfied.
    pub fn matched_for(&self, requirement: &str) -> Option<&[String]> {
        self.matched
            .iter()
            .find(|m| m.requirement == requirement)
            .map(|m| m.datasets.as_slice())
    }
}

/// Trait for deciding whether available datasets satisfy a module's needs.
pub trait CompatibilityResolver {
    fn check(&self, module: &ModuleRecord, available: &[String]) -> CompatibilityReport;
}

/// Default resolver with a configurable combination mode.
#[derive(Debug, Clone, Default)]
pub struct DefaultCompatibilityResolver {
    pub mode: CombinationMode,
}

impl DefaultCompatibilityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: CombinationMode) -> Self {
        Self { mode }
    }

    /// Datasets satisfying one requirement, first occurrence order preserved,
    /// duplicates in the available list collapsed.
    fn match_token(&self, token: &RequirementToken, available: &[String]) -> Vec<String> {
        let mut hits: Vec<String> = Vec::new();
        for dataset in available {
            if token.matches(dataset) && !hits.contains(dataset) {
                hits.push(dataset.clone());
            }
        }
        hits
    }

    fn build_combinations(
        &self,
        requirements: &[RequirementToken],
        matched: &[MatchedRequirement],
    ) -> Vec<String> {
        // Partition in declaration order: exact matches contribute exactly one
        // id each, flexible matches contribute a candidate group.
        let mut exact_ids: Vec<String> = Vec::new();
        let mut flexible_groups: Vec<&[String]> = Vec::new();
        for (token, hit) in requirements.iter().zip(matched.iter()) {
            if token.is_flexible() {
                flexible_groups.push(&hit.datasets);
            } else {
                exact_ids.extend(hit.datasets.iter().cloned());
            }
        }

        if flexible_groups.is_empty() {
            if exact_ids.is_empty() {
                return Vec::new();
            }
            return vec![exact_ids.join(COMBINATION_SEPARATOR)];
        }

        match self.mode {
            CombinationMode::SingleAxis => {
                self.enumerate_single_axis(&exact_ids, &flexible_groups)
            }
            CombinationMode::CartesianProduct => {
                self.enumerate_cartesian(&exact_ids, &flexible_groups)
            }
        }
    }

    /// One combination per candidate of each flexible group, varying a single
    /// group at a time while exact ids stay fixed.
    fn enumerate_single_axis(&self, exact_ids: &[String], groups: &[&[String]]) -> Vec<String> {
        let mut combinations = Vec::new();
        for group in groups {
            for candidate in group.iter() {
                let mut ids: Vec<&str> = exact_ids.iter().map(|s| s.as_str()).collect();
                ids.push(candidate);
                combinations.push(ids.join(COMBINATION_SEPARATOR));
            }
        }
        combinations
    }

    /// Full cross-product over flexible groups. Combinations that would assign
    /// the same dataset to two requirements are skipped.
    fn enumerate_cartesian(&self, exact_ids: &[String], groups: &[&[String]]) -> Vec<String> {
        let mut combinations = Vec::new();
        let mut picks = vec![0usize; groups.len()];
        'odometer: loop {
            let mut ids: Vec<&str> = exact_ids.iter().map(|s| s.as_str()).collect();
            let mut distinct = true;
            for (group, &pick) in groups.iter().zip(picks.iter()) {
                let id = group[pick].as_str();
                if ids.contains(&id) {
                    distinct = false;
                    break;
                }
                ids.push(id);
            }
            if distinct {
                combinations.push(ids.join(COMBINATION_SEPARATOR));
            }

            let mut idx = groups.len();
            while idx > 0 {
                idx -= 1;
                picks[idx] += 1;
                if picks[idx] < groups[idx].len() {
                    continue 'odometer;
                }
                picks[idx] = 0;
            }
            break;
        }
        combinations
    }
}

impl CompatibilityResolver for DefaultCompatibilityResolver {
    fn check(&self, module: &ModuleRecord, available: &[String]) -> CompatibilityReport {
        let mut matched: Vec<MatchedRequirement> = Vec::new();
        let mut missing: Vec<String> = Vec::new();

        for token in &module.required_capabilities {
            let hits = self.match_token(token, available);
            if hits.is_empty() {
                missing.push(token.display().to_string());
            } else {
                matched.push(MatchedRequirement {
                    requirement: token.display().to_string(),
                    datasets: hits,
                });
            }
        }

        let compatible = missing.is_empty();
        let combinations = if compatible {
            self.build_combinations(&module.required_capabilities, &matched)
        } else {
            Vec::new()
        };

        CompatibilityReport {
            module_name: module.name.clone(),
            compatible,
            combinations,
            required: module.required_display(),
            typical: module.typical_identifiers.clone(),
            available: available.to_vec(),
            missing,
            matched,
            details: module.dataset_requirements.clone(),
            notes: module.notes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_record, PackageKind};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn check(requirements: &[&str], available: &[&str]) -> CompatibilityReport {
        let module = test_record("tm_test", PackageKind::Clinical, "test module", requirements);
        DefaultCompatibilityResolver::new().check(&module, &strings(available))
    }

    #[test]
    fn exact_requirements_form_a_single_combination() {
        let report = check(&["ADSL", "ADTTE"], &["ADSL", "ADTTE", "ADLB"]);
        assert!(report.compatible);
        assert!(report.missing.is_empty());
        assert_eq!(report.combinations, vec!["ADSL + ADTTE"]);
    }

    #[test]
    fn flexible_requirement_matches_category_members() {
        let report = check(&["BDS_CONTINUOUS"], &["ADSL", "ADLB"]);
        assert!(report.compatible);
        assert_eq!(
            report.matched_for("BDS_CONTINUOUS"),
            Some(strings(&["ADLB"]).as_slice())
        );
        assert_eq!(report.combinations, vec!["ADLB"]);
    }

    #[test]
    fn unmatched_flexible_requirement_is_reported_missing() {
        let report = check(&["BDS_CONTINUOUS"], &["ADSL", "ADAE"]);
        assert!(!report.compatible);
        assert_eq!(report.missing, strings(&["BDS_CONTINUOUS"]));
        assert!(report.combinations.is_empty());
    }

    #[test]
    fn exact_plus_flexible_varies_the_flexible_axis() {
        let report = check(&["ADSL", "BDS_CONTINUOUS"], &["ADSL", "ADLB", "ADVS"]);
        assert!(report.compatible);
        assert_eq!(report.combinations, vec!["ADSL + ADLB", "ADSL + ADVS"]);
    }

    #[test]
    fn no_requirements_is_trivially_compatible() {
        let report = check(&[], &["ADSL", "ADAE"]);
        assert!(report.compatible);
        assert!(report.matched.is_empty());
        assert!(report.missing.is_empty());
        assert!(report.combinations.is_empty());

        let empty_available = check(&[], &[]);
        assert!(empty_available.compatible);
    }

    #[test]
    fn exact_matching_is_case_sensitive() {
        let report = check(&["ADSL"], &["adsl"]);
        assert!(!report.compatible);
        assert_eq!(report.missing, strings(&["ADSL"]));
    }

    #[test]
    fn duplicate_available_entries_collapse_in_match_lists() {
        let report = check(&["BDS_CONTINUOUS"], &["ADLB", "ADLB", "ADVS"]);
        assert_eq!(
            report.matched_for("BDS_CONTINUOUS"),
            Some(strings(&["ADLB", "ADVS"]).as_slice())
        );
        // Caller's list passes through untouched
        assert_eq!(report.available, strings(&["ADLB", "ADLB", "ADVS"]));
    }

    #[test]
    fn narrow_member_satisfies_broad_category_too() {
        let report = check(&["BDS_BINARY", "BDS_DATASET"], &["ADRS"]);
        assert!(report.compatible);
        assert_eq!(report.matched_for("BDS_BINARY"), Some(strings(&["ADRS"]).as_slice()));
        assert_eq!(report.matched_for("BDS_DATASET"), Some(strings(&["ADRS"]).as_slice()));
    }

    #[test]
    fn unknown_category_is_never_satisfied() {
        let report = check(&["BDS_TIME_TO_EVENT"], &["ADSL", "ADTTE", "ADLB", "ADRS"]);
        assert!(!report.compatible);
        assert_eq!(report.missing, strings(&["BDS_TIME_TO_EVENT"]));
    }

    #[test]
    fn matched_order_follows_declaration_order() {
        let report = check(
            &["ADSL", "BDS_BINARY", "ADTTE"],
            &["ADTTE", "ADRS", "ADSL"],
        );
        let order: Vec<&str> = report.matched.iter().map(|m| m.requirement.as_str()).collect();
        assert_eq!(order, vec!["ADSL", "BDS_BINARY", "ADTTE"]);
    }

    #[test]
    fn report_serializes_with_wire_field_names() {
        let report = check(&["ADSL", "BDS_CONTINUOUS"], &["ADSL", "ADLB", "ADVS"]);
        let json = serde_json::to_string(&report).unwrap();
        for key in [
            "\"module_name\"",
            "\"compatible\"",
            "\"compatible_combinations\"",
            "\"required_datasets\"",
            "\"typical_datasets\"",
            "\"available_datasets\"",
            "\"missing_datasets\"",
            "\"matched_datasets\"",
            "\"dataset_requirements\"",
            "\"notes\"",
        ] {
            assert!(json.contains(key), "missing {} in {}", key, json);
        }
        // matched_datasets is an object keyed by requirement, in declaration order
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["matched_datasets"]["ADSL"][0], "ADSL");
        assert_eq!(parsed["matched_datasets"]["BDS_CONTINUOUS"][0], "ADLB");
        assert_eq!(parsed["matched_datasets"]["BDS_CONTINUOUS"][1], "ADVS");
    }

    #[test]
    fn identical_inputs_produce_identical_reports() {
        let module = test_record(
            "tm_test",
            PackageKind::Clinical,
            "test module",
            &["ADSL", "BDS_CONTINUOUS"],
        );
        let available = strings(&["ADSL", "ADVS", "ADLB"]);
        let resolver = DefaultCompatibilityResolver::new();
        let first = serde_json::to_string(&resolver.check(&module, &available)).unwrap();
        let second = serde_json::to_string(&resolver.check(&module, &available)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn single_axis_varies_one_group_at_a_time() {
        let module = test_record(
            "tm_test",
            PackageKind::Clinical,
            "test module",
            &["ADSL", "BDS_CONTINUOUS", "BDS_BINARY"],
        );
        let available = strings(&["ADSL", "ADLB", "ADVS", "ADRS"]);
        let report = DefaultCompatibilityResolver::new().check(&module, &available);
        // One entry per candidate per group, never a joint assignment
        assert_eq!(
            report.combinations,
            vec!["ADSL + ADLB", "ADSL + ADVS", "ADSL + ADRS"]
        );
    }

    #[test]
    fn cartesian_mode_enumerates_joint_assignments() {
        let module = test_record(
            "tm_test",
            PackageKind::Clinical,
            "test module",
            &["ADSL", "BDS_CONTINUOUS", "BDS_BINARY"],
        );
        let available = strings(&["ADSL", "ADLB", "ADVS", "ADRS"]);
        let resolver =
            DefaultCompatibilityResolver::with_mode(CombinationMode::CartesianProduct);
        let report = resolver.check(&module, &available);
        assert_eq!(
            report.combinations,
            vec!["ADSL + ADLB + ADRS", "ADSL + ADVS + ADRS"]
        );
    }

    #[test]
    fn cartesian_mode_skips_double_assignment_of_one_dataset() {
        let module = test_record(
            "tm_test",
            PackageKind::Clinical,
            "test module",
            &["BDS_DATASET", "BDS_BINARY"],
        );
        // ADRS is the only binary candidate and also a broad member
        let available = strings(&["ADRS", "ADLB"]);
        let resolver =
            DefaultCompatibilityResolver::with_mode(CombinationMode::CartesianProduct);
        let report = resolver.check(&module, &available);
        assert_eq!(report.combinations, vec!["ADLB + ADRS"]);
    }

    #[test]
    fn combination_mode_parses_config_strings() {
        assert_eq!(
            CombinationMode::parse("single-axis"),
            Some(CombinationMode::SingleAxis)
        );
        assert_eq!(
            CombinationMode::parse("cartesian-product"),
            Some(CombinationMode::CartesianProduct)
        );
        assert_eq!(CombinationMode::parse("everything"), None);
    }
}
