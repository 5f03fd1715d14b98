//! Serves the baseline Teal application template.

use super::AppContext;
use crate::error::Result;
use crate::render::ResponseFormat;
use serde::Deserialize;
use serde_json::json;

const TEMPLATE_FILE: &str = "app.template.R";

const NEXT_STEPS: &str = r#"## Next Steps

1. Copy the template above to `app.R`
2. Use `tealflow_search_modules_by_analysis` to find modules for your analysis
3. Use `tealflow_generate_module_code` to generate code for each module
4. Add generated modules inside `modules()`
5. Run the app with `Rscript app.R` or in RStudio

## Example Module Addition

```r
# In the modules() section:
app <- init(
  data = data,
  modules = modules(
    tm_front_page(
      label = "App Info",
    ),
    tm_data_table("Data Table"),
    tm_variable_browser("Variable Browser"),
    # Add your modules here:
    tm_g_km(
      label = "Kaplan-Meier Plot",
      dataname = "ADTTE",
      ...
    )
  )
)
```"#;

#[derive(Debug, Default, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub response_format: ResponseFormat,
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let path = ctx.knowledge_base_path(TEMPLATE_FILE);
    let template = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(format!(
                "Error: Template file not found at {}/{}",
                ctx.config.knowledge_base.dir, TEMPLATE_FILE
            ));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(match params.response_format {
        ResponseFormat::Markdown => format!(
            "# Teal App Template\n\n\
             This is the base template for creating Teal applications. \
             Copy this code as your starting point.\n\n\
             ```r\n{template}```\n\n{NEXT_STEPS}"
        ),
        ResponseFormat::Json => {
            let payload = json!({
                "template": template,
                "file_name": TEMPLATE_FILE,
                "usage_instructions": [
                    "Copy template to app.R",
                    "Search for modules with tealflow_search_modules_by_analysis",
                    "Generate module code with tealflow_generate_module_code",
                    "Add modules to the modules() section",
                    "Run the app",
                ],
            });
            serde_json::to_string_pretty(&payload)?
        }
    })
}
