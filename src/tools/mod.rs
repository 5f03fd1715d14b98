//! Tool implementations.
//!
//! Each tool lives in its own module with a `Params` struct deserialized
//! from the request body and an async `run` entry point. Tools know nothing
//! about the transport; they take the shared [`AppContext`] and return
//! rendered text in the caller's requested format.

pub mod app_template;
pub mod check_requirements;
pub mod data_loading;
pub mod dataset_info;
pub mod discovery;
pub mod guidance;
pub mod list_datasets;
pub mod list_modules;
pub mod module_code;
pub mod module_details;
pub mod renv;
pub mod search;
pub mod startup_check;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Result, TealflowError};
use crate::metrics;
use crate::resolver::{CombinationMode, DefaultCompatibilityResolver};
use crate::rscript::RScriptRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every tool invocation.
///
/// The catalog is built once at startup and never mutated afterwards, so
/// concurrent invocations share it without locking.
pub struct AppContext {
    pub catalog: Arc<Catalog>,
    pub config: Config,
    pub resolver: DefaultCompatibilityResolver,
    pub rscript: Arc<dyn RScriptRunner>,
}

impl AppContext {
    pub fn new(catalog: Arc<Catalog>, config: Config, rscript: Arc<dyn RScriptRunner>) -> Self {
        let mode =
            CombinationMode::parse(&config.resolver.combination_mode).unwrap_or_default();
        Self {
            catalog,
            config,
            resolver: DefaultCompatibilityResolver::with_mode(mode),
            rscript,
        }
    }

    /// Path of a knowledge-base file read at request time.
    pub fn knowledge_base_path(&self, file: &str) -> PathBuf {
        Path::new(&self.config.knowledge_base.dir).join(file)
    }

    pub fn rscript_timeout(&self) -> Duration {
        Duration::from_secs(self.config.rscript.timeout_secs)
    }
}

/// Module-name input check shared by the lookup tools.
pub fn validated_module_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(TealflowError::InvalidParameter(
            "Module name cannot be empty".to_string(),
        ));
    }
    if name.len() < 3 || name.len() > 100 {
        return Err(TealflowError::InvalidParameter(format!(
            "Module name must be 3 to 100 characters, got {}",
            name.len()
        )));
    }
    Ok(name.to_string())
}

/// Guidance string for a failed module lookup, with a close-name suggestion
/// when the catalog has one.
pub fn module_not_found(catalog: &Catalog, name: &str) -> String {
    metrics::record_catalog_lookup_miss();
    let mut msg = format!("Error: Module '{}' not found.", name);
    if let Some(suggestion) = catalog.find_similar(name) {
        msg.push_str(&format!(" Did you mean '{}'?", suggestion));
    }
    msg
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::catalog::{test_record, ModuleParameters, PackageKind, ParameterSpec};
    use crate::rscript::testing::StaticRunner;
    use std::collections::BTreeMap;

    fn spec(param_type: &str, description: &str) -> ParameterSpec {
        ParameterSpec {
            param_type: param_type.to_string(),
            description: description.to_string(),
        }
    }

    /// Compact catalog exercising every module shape the tools branch on.
    pub fn small_catalog() -> Catalog {
        let mut km = test_record(
            "tm_g_km",
            PackageKind::Clinical,
            "Kaplan-Meier survival plot",
            &["ADSL", "ADTTE"],
        );
        km.typical_identifiers = vec!["ADTTE".to_string()];
        km.dataset_requirements.insert(
            "ADTTE".to_string(),
            "Time-to-event data with AVAL and CNSR".to_string(),
        );
        km.parameters.required_params = BTreeMap::from([
            ("label".to_string(), spec("string", "Module label")),
            ("dataname".to_string(), spec("string", "Analysis dataset name")),
            (
                "arm_var".to_string(),
                spec("choices_selected", "Treatment arm variable"),
            ),
            (
                "paramcd".to_string(),
                spec("choices_selected", "Endpoint parameter"),
            ),
        ]);
        km.parameters.params_with_defaults = BTreeMap::from([
            ("conf_level".to_string(), serde_json::json!(0.95)),
            ("plot_height".to_string(), serde_json::json!([800, 400, 5000])),
        ]);

        let mut ancova = test_record(
            "tm_t_ancova",
            PackageKind::Clinical,
            "ANCOVA summary table",
            &["ADSL", "BDS_CONTINUOUS"],
        );
        ancova.typical_identifiers = vec!["ADQS".to_string(), "ADLB".to_string()];

        let mut vitals = test_record(
            "tm_g_pp_vitals",
            PackageKind::Clinical,
            "Patient profile vitals plot",
            &["ADSL", "ADVS"],
        );
        vitals.parameters.required_params =
            BTreeMap::from([("label".to_string(), spec("string", "Module label"))]);

        let mut scatter = test_record(
            "tm_g_scatterplot",
            PackageKind::General,
            "Scatter plot of two variables",
            &[],
        );
        scatter.parameters = ModuleParameters {
            required_params: BTreeMap::from([
                ("label".to_string(), spec("string", "Module label")),
                (
                    "x".to_string(),
                    spec("data_extract_spec", "Variable on the x axis"),
                ),
                (
                    "y".to_string(),
                    spec("data_extract_spec", "Variable on the y axis"),
                ),
            ]),
            params_with_defaults: BTreeMap::new(),
        };

        let table = test_record(
            "tm_data_table",
            PackageKind::General,
            "Interactive data table viewer",
            &[],
        );

        let categories = vec![
            crate::catalog::AnalysisCategory {
                name: "survival_analysis".to_string(),
                package: PackageKind::Clinical,
                description: "Time-to-event analysis including Kaplan-Meier curves".to_string(),
                modules: vec!["tm_g_km".to_string()],
            },
            crate::catalog::AnalysisCategory {
                name: "data_exploration".to_string(),
                package: PackageKind::General,
                description: "Interactive exploration of raw datasets".to_string(),
                modules: vec!["tm_data_table".to_string(), "tm_g_scatterplot".to_string()],
            },
        ];

        Catalog::from_parts(
            vec![km, ancova, vitals, scatter, table],
            categories,
            "deadbeef".to_string(),
            0.6,
        )
    }

    pub fn context_with(catalog: Catalog, rscript: Arc<dyn RScriptRunner>) -> AppContext {
        AppContext {
            catalog: Arc::new(catalog),
            config: Config::default(),
            resolver: DefaultCompatibilityResolver::new(),
            rscript,
        }
    }

    pub fn context() -> AppContext {
        context_with(small_catalog(), Arc::new(StaticRunner::succeeding("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_bounds() {
        assert_eq!(validated_module_name(" tm_g_km ").unwrap(), "tm_g_km");
        assert!(validated_module_name("").is_err());
        assert!(validated_module_name("   ").is_err());
        assert!(validated_module_name("ab").is_err());
        assert!(validated_module_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn not_found_message_includes_suggestion_when_close() {
        let catalog = testing::small_catalog();
        let msg = module_not_found(&catalog, "tm_g_kma");
        assert_eq!(
            msg,
            "Error: Module 'tm_g_kma' not found. Did you mean 'tm_g_km'?"
        );

        let msg = module_not_found(&catalog, "zzz_not_even_close");
        assert_eq!(msg, "Error: Module 'zzz_not_even_close' not found.");
    }
}
