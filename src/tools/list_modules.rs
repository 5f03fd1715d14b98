//! Module listing tool.

use super::AppContext;
use crate::catalog::PackageFilter;
use crate::error::Result;
use crate::render::{format_module_list, truncate_response, ResponseFormat};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    pub package: PackageFilter,
    /// Case-insensitive substring over module name and description.
    pub category: Option<String>,
    pub response_format: ResponseFormat,
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let modules = ctx.catalog.list(params.package, category);

    if modules.is_empty() {
        return Ok(format!(
            "No modules found matching filters (package={}, category={})",
            params.package.as_str(),
            category.unwrap_or("None")
        ));
    }

    let response = format_module_list(&modules, params.package, params.response_format);
    Ok(truncate_response(response, None))
}
