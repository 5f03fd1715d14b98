//! Knowledge base loading and validation.
//!
//! The catalog is assembled from four JSON files shipped under the knowledge
//! base directory, each validated against its JSON Schema before parsing.
//! Any missing or malformed file aborts the load with an error naming it;
//! there is no empty-catalog fallback.

use crate::catalog::{
    AnalysisCategory, Catalog, ModuleParameters, ModuleRecord, PackageKind, RequirementToken,
};
use crate::error::{Result, TealflowError};
use jsonschema::JSONSchema;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const MODULES_CLINICAL_FILE: &str = "modules_clinical.json";
pub const MODULES_GENERAL_FILE: &str = "modules_general.json";
pub const ANALYSIS_TYPES_CLINICAL_FILE: &str = "analysis_types_clinical.json";
pub const ANALYSIS_TYPES_GENERAL_FILE: &str = "analysis_types_general.json";
pub const MODULES_SCHEMA_FILE: &str = "schemas/modules.schema.json";
pub const ANALYSIS_TYPES_SCHEMA_FILE: &str = "schemas/analysis_types.schema.json";

#[derive(Debug, Deserialize)]
struct ModulesFile {
    modules: BTreeMap<String, RawModule>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    #[serde(default)]
    description: String,
    #[serde(default)]
    required_datasets: Vec<String>,
    #[serde(default)]
    typical_datasets: Vec<String>,
    #[serde(default)]
    dataset_requirements: BTreeMap<String, String>,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    function_parameters: ModuleParameters,
}

#[derive(Debug, Deserialize)]
struct AnalysisTypesFile {
    analysis_types: BTreeMap<String, RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default)]
    description: String,
    #[serde(default)]
    modules: Vec<String>,
}

/// Load and validate the knowledge base, producing the process catalog.
pub fn load_catalog<P: AsRef<Path>>(dir: P, similarity_cutoff: f64) -> Result<Catalog> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(TealflowError::KnowledgeBase {
            message: format!("Knowledge base directory does not exist: {}", dir.display()),
        });
    }

    let modules_schema = compile_schema(&dir.join(MODULES_SCHEMA_FILE))?;
    let analysis_types_schema = compile_schema(&dir.join(ANALYSIS_TYPES_SCHEMA_FILE))?;

    let mut fingerprint_hasher = Sha256::new();
    let mut records: Vec<ModuleRecord> = Vec::new();
    let module_sources = [
        (MODULES_CLINICAL_FILE, PackageKind::Clinical),
        (MODULES_GENERAL_FILE, PackageKind::General),
    ];
    for (file_name, package) in module_sources {
        let (value, raw_bytes) = read_validated_json(dir, file_name, &modules_schema)?;
        fingerprint_hasher.update(&raw_bytes);
        let parsed: ModulesFile =
            serde_json::from_value(value).map_err(|e| TealflowError::KnowledgeBase {
                message: format!("Failed to parse {}: {}", file_name, e),
            })?;
        for (name, raw) in parsed.modules {
            if records.iter().any(|r| r.name == name) {
                return Err(TealflowError::KnowledgeBase {
                    message: format!("Duplicate module name '{}' in {}", name, file_name),
                });
            }
            records.push(build_record(name, package, raw));
        }
    }

    let mut categories: Vec<AnalysisCategory> = Vec::new();
    let category_sources = [
        (ANALYSIS_TYPES_CLINICAL_FILE, PackageKind::Clinical),
        (ANALYSIS_TYPES_GENERAL_FILE, PackageKind::General),
    ];
    for (file_name, package) in category_sources {
        let (value, raw_bytes) = read_validated_json(dir, file_name, &analysis_types_schema)?;
        fingerprint_hasher.update(&raw_bytes);
        let parsed: AnalysisTypesFile =
            serde_json::from_value(value).map_err(|e| TealflowError::KnowledgeBase {
                message: format!("Failed to parse {}: {}", file_name, e),
            })?;
        for (name, raw) in parsed.analysis_types {
            for module in &raw.modules {
                if !records.iter().any(|r| &r.name == module) {
                    warn!(
                        "Analysis category '{}' references unknown module '{}'",
                        name, module
                    );
                }
            }
            categories.push(AnalysisCategory {
                name,
                package,
                description: raw.description,
                modules: raw.modules,
            });
        }
    }

    let fingerprint = hex::encode(fingerprint_hasher.finalize());
    let catalog = Catalog::from_parts(records, categories, fingerprint, similarity_cutoff);
    info!(
        "Loaded knowledge base from {}: {} modules, {} analysis categories, fingerprint {}",
        dir.display(),
        catalog.module_count(),
        catalog.categories().len(),
        catalog.fingerprint()
    );
    Ok(catalog)
}

fn build_record(name: String, package: PackageKind, raw: RawModule) -> ModuleRecord {
    let mut tokens = Vec::with_capacity(raw.required_datasets.len());
    for raw_token in &raw.required_datasets {
        let token = RequirementToken::parse(raw_token);
        if let RequirementToken::UnknownCategory(tag) = &token {
            warn!(
                "Module '{}' declares unrecognized dataset category '{}'; it can never be satisfied",
                name, tag
            );
        }
        tokens.push(token);
    }
    ModuleRecord {
        name,
        package,
        description: raw.description,
        required_capabilities: tokens,
        typical_identifiers: raw.typical_datasets,
        dataset_requirements: raw.dataset_requirements,
        notes: raw.notes,
        parameters: raw.function_parameters,
    }
}

fn compile_schema(path: &Path) -> Result<JSONSchema> {
    let schema_json = read_json_file(path)?;
    // jsonschema 0.17 wants a 'static schema; leak it for process lifetime
    let schema_static: &'static Value = Box::leak(Box::new(schema_json));
    JSONSchema::options()
        .compile(schema_static)
        .map_err(|e| TealflowError::KnowledgeBase {
            message: format!("Failed to compile schema {}: {}", path.display(), e),
        })
}

fn read_json_file(path: &Path) -> Result<Value> {
    let data = fs::read_to_string(path).map_err(|e| TealflowError::KnowledgeBase {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;
    serde_json::from_str(&data).map_err(|e| TealflowError::KnowledgeBase {
        message: format!("Failed to parse JSON in {}: {}", path.display(), e),
    })
}

fn read_validated_json(
    dir: &Path,
    file_name: &str,
    schema: &JSONSchema,
) -> Result<(Value, Vec<u8>)> {
    let path = dir.join(file_name);
    let value = read_json_file(&path)?;
    if let Err(errors) = schema.validate(&value) {
        let detail: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(TealflowError::KnowledgeBase {
            message: format!(
                "Schema validation failed for {}: {}",
                path.display(),
                detail.join("; ")
            ),
        });
    }
    let raw_bytes = fs::read(&path).map_err(|e| TealflowError::KnowledgeBase {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;
    Ok((value, raw_bytes))
}
