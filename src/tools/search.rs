//! Analysis-type search over the category index, with text-search fallback.

use super::AppContext;
use crate::catalog::{AnalysisCategory, ModuleRecord};
use crate::error::{Result, TealflowError};
use crate::render::{required_datasets_line, title_words, truncate_response, ResponseFormat};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
pub struct Params {
    pub analysis_type: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Category hits keep the whole category so rendering can show its
/// description and module list alongside the score.
struct CategoryMatch<'a> {
    category: &'a AnalysisCategory,
    score: i32,
}

struct ModuleMatch<'a> {
    record: &'a ModuleRecord,
    /// Categories the module appeared in (category phase) or its text score.
    categories: Vec<String>,
    score: i32,
}

fn validated_analysis_type(raw: &str) -> Result<String> {
    let term = raw.trim();
    if term.is_empty() {
        return Err(TealflowError::InvalidParameter(
            "Analysis type cannot be empty".to_string(),
        ));
    }
    if term.len() < 2 || term.len() > 200 {
        return Err(TealflowError::InvalidParameter(format!(
            "Analysis type must be 2 to 200 characters, got {}",
            term.len()
        )));
    }
    Ok(term.to_lowercase())
}

fn score_category(category: &AnalysisCategory, search_term: &str) -> i32 {
    let name_text = category.name.to_lowercase().replace('_', " ");
    let description = category.description.to_lowercase();
    let mut score = 0;
    if name_text.contains(search_term) {
        score += 20;
    }
    if description.contains(search_term) {
        score += 10;
    }
    for word in search_term.split_whitespace() {
        if word.len() > 2 {
            if name_text.contains(word) {
                score += 8;
            }
            if description.contains(word) {
                score += 4;
            }
        }
    }
    score
}

fn score_module(record: &ModuleRecord, search_term: &str) -> i32 {
    let name = record.name.to_lowercase();
    let description = record.description.to_lowercase();
    let mut score = 0;
    if name.contains(search_term) {
        score += 10;
    }
    if description.contains(search_term) {
        score += 5;
    }
    for word in search_term.split_whitespace() {
        if word.len() > 2 {
            if name.contains(word) {
                score += 3;
            }
            if description.contains(word) {
                score += 2;
            }
        }
    }
    score
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let search_term = validated_analysis_type(&params.analysis_type)?;

    let mut category_matches: Vec<CategoryMatch> = ctx
        .catalog
        .categories()
        .iter()
        .map(|category| CategoryMatch {
            score: score_category(category, &search_term),
            category,
        })
        .filter(|m| m.score > 0)
        .collect();
    category_matches.sort_by(|a, b| b.score.cmp(&a.score));

    let response = if !category_matches.is_empty() {
        render_category_results(ctx, &search_term, &category_matches, params.response_format)
    } else {
        render_text_results(ctx, &search_term, params.response_format)
    };

    Ok(truncate_response(response, None))
}

fn render_category_results(
    ctx: &AppContext,
    search_term: &str,
    category_matches: &[CategoryMatch],
    format: ResponseFormat,
) -> String {
    // Union of the top 3 categories' modules, alphabetical for determinism.
    let mut member_names: BTreeSet<&str> = BTreeSet::new();
    for cat_match in category_matches.iter().take(3) {
        member_names.extend(cat_match.category.modules.iter().map(String::as_str));
    }

    let matches: Vec<ModuleMatch> = member_names
        .iter()
        .filter_map(|name| ctx.catalog.get(name))
        .map(|record| ModuleMatch {
            categories: category_matches
                .iter()
                .filter(|c| c.category.modules.iter().any(|m| m == &record.name))
                .map(|c| c.category.name.clone())
                .collect(),
            score: 0,
            record,
        })
        .collect();

    match format {
        ResponseFormat::Markdown => {
            let mut lines: Vec<String> =
                vec![format!("# Modules for '{}' Analysis", search_term), String::new()];

            lines.push("## Matching Analysis Categories".to_string());
            lines.push(String::new());
            for cat_match in category_matches.iter().take(3) {
                let category = cat_match.category;
                lines.push(format!(
                    "### {} ({})",
                    title_words(&category.name),
                    title_words(category.package.as_str())
                ));
                lines.push(category.description.clone());
                let shown: Vec<&str> =
                    category.modules.iter().take(5).map(String::as_str).collect();
                lines.push(format!("**Modules**: {}", shown.join(", ")));
                if category.modules.len() > 5 {
                    lines.push(format!("... and {} more", category.modules.len() - 5));
                }
                lines.push(String::new());
            }

            lines.push(format!("## All Matching Modules ({} total)", matches.len()));
            lines.push(String::new());
            for m in matches.iter().take(10) {
                lines.push(format!("### {}", m.record.name));
                lines.push(format!("**Description**: {}", m.record.description));
                lines.push(format!(
                    "**Required Datasets**: {}",
                    required_datasets_line(m.record)
                ));
                lines.push(format!("**Categories**: {}", m.categories.join(", ")));
                lines.push(String::new());
            }
            if matches.len() > 10 {
                lines.push(format!("... and {} more modules", matches.len() - 10));
            }

            lines.join("\n")
        }
        ResponseFormat::Json => {
            let categories: Vec<_> = category_matches
                .iter()
                .take(5)
                .map(|c| {
                    json!({
                        "category": c.category.name,
                        "type": c.category.package.as_str(),
                        "description": c.category.description,
                        "modules": c.category.modules,
                        "score": c.score,
                    })
                })
                .collect();
            let modules: Vec<_> = matches
                .iter()
                .take(20)
                .map(|m| {
                    json!({
                        "name": m.record.name,
                        "description": m.record.description,
                        "required_datasets": m.record.required_display(),
                        "categories": m.categories,
                    })
                })
                .collect();
            let payload = json!({
                "query": search_term,
                "matching_categories": categories,
                "count": matches.len(),
                "modules": modules,
            });
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

fn render_text_results(ctx: &AppContext, search_term: &str, format: ResponseFormat) -> String {
    let mut matches: Vec<ModuleMatch> = ctx
        .catalog
        .module_names()
        .iter()
        .filter_map(|name| ctx.catalog.get(name))
        .map(|record| ModuleMatch {
            categories: Vec::new(),
            score: score_module(record, search_term),
            record,
        })
        .filter(|m| m.score > 0)
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score));

    if matches.is_empty() {
        let category_lines: Vec<String> = ctx
            .catalog
            .categories()
            .iter()
            .take(10)
            .map(|c| format!("  - {}", c.name.replace('_', " ")))
            .collect();
        return format!(
            "No modules found for '{}'.\n\nAvailable analysis categories:\n{}\n\n\
             Try terms like: 'survival', 'safety', 'efficacy', 'data exploration', 'visualization'",
            search_term,
            category_lines.join("\n")
        );
    }

    match format {
        ResponseFormat::Markdown => {
            let mut lines: Vec<String> =
                vec![format!("# Text Search Results for '{}'", search_term), String::new()];
            lines.push(format!(
                "Found {} matching module(s) via text search:",
                matches.len()
            ));
            lines.push(String::new());
            for m in matches.iter().take(10) {
                lines.push(format!("## {}", m.record.name));
                lines.push(format!("**Description**: {}", m.record.description));
                lines.push(format!(
                    "**Required Datasets**: {}",
                    required_datasets_line(m.record)
                ));
                lines.push(String::new());
            }
            if matches.len() > 10 {
                lines.push(format!("... and {} more matches", matches.len() - 10));
            }
            lines.join("\n")
        }
        ResponseFormat::Json => {
            let entries: Vec<_> = matches
                .iter()
                .take(20)
                .map(|m| {
                    json!({
                        "name": m.record.name,
                        "description": m.record.description,
                        "required_datasets": m.record.required_display(),
                        "score": m.score,
                    })
                })
                .collect();
            let payload = json!({
                "query": search_term,
                "count": matches.len(),
                "matches": entries,
            });
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
        }
    }
}
