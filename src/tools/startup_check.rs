//! Startup smoke test for a Shiny application.
//!
//! Runs the app file under the configured interpreter with a short timeout.
//! A healthy Shiny app never exits on its own, so reaching the listening
//! state before the timeout fires counts as success.

use super::AppContext;
use crate::error::{Result, TealflowError};
use crate::render::ResponseFormat;
use crate::rscript::RunOutput;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;

fn default_app_path() -> String {
    ".".to_string()
}

fn default_app_filename() -> String {
    "app.R".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_format() -> ResponseFormat {
    ResponseFormat::Json
}

#[derive(Debug, Deserialize)]
pub struct Params {
    #[serde(default = "default_app_path")]
    pub app_path: String,
    #[serde(default = "default_app_filename")]
    pub app_filename: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_format")]
    pub response_format: ResponseFormat,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            app_path: default_app_path(),
            app_filename: default_app_filename(),
            timeout_seconds: default_timeout_seconds(),
            response_format: default_format(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StartupReport {
    status: &'static str,
    error_type: Option<&'static str>,
    message: String,
    logs_excerpt: String,
}

impl StartupReport {
    fn render(&self, format: ResponseFormat) -> Result<String> {
        Ok(match format {
            ResponseFormat::Json => serde_json::to_string_pretty(self)?,
            ResponseFormat::Markdown => {
                let emoji = if self.status == "ok" { "✅" } else { "❌" };
                let mut md = format!(
                    "# {} Shiny Startup Check: {}\n\n",
                    emoji,
                    self.status.to_uppercase()
                );
                if let Some(error_type) = self.error_type {
                    md.push_str(&format!("**Error Type:** `{}`\n\n", error_type));
                }
                md.push_str(&format!("**Message:** {}\n\n", self.message));
                if !self.logs_excerpt.trim().is_empty() {
                    md.push_str("### Startup Logs\n```\n");
                    md.push_str(&self.logs_excerpt);
                    md.push_str("\n```\n");
                }
                md
            }
        })
    }
}

pub async fn run(ctx: &AppContext, params: Params) -> Result<String> {
    let app_path = params.app_path.trim();
    if app_path.is_empty() {
        return Err(TealflowError::InvalidParameter(
            "App path cannot be empty".to_string(),
        ));
    }
    let app_filename = params.app_filename.trim();
    if app_filename.is_empty() {
        return Err(TealflowError::InvalidParameter(
            "App filename cannot be empty".to_string(),
        ));
    }
    if !app_filename.ends_with(".R") {
        return Err(TealflowError::InvalidParameter(
            "App filename must end with .R".to_string(),
        ));
    }
    let timeout_seconds = params
        .timeout_seconds
        .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

    let app_dir = Path::new(app_path);
    let app_file = app_dir.join(app_filename);
    if !app_file.exists() {
        let report = StartupReport {
            status: "error",
            error_type: Some("file_not_found"),
            message: format!("{} not found at {}", app_filename, app_file.display()),
            logs_excerpt: format!(
                "Expected file: {}\nDirectory contents: {}",
                app_file.display(),
                directory_contents(app_dir)
            ),
        };
        return report.render(params.response_format);
    }

    let output = match ctx
        .rscript
        .run_script(
            app_filename,
            app_dir,
            &[("R_BROWSER".to_string(), "false".to_string())],
            Duration::from_secs(timeout_seconds),
        )
        .await
    {
        Ok(output) => output,
        Err(TealflowError::RscriptNotFound) => {
            let report = StartupReport {
                status: "error",
                error_type: Some("rscript_not_found"),
                message: "Rscript command not found. Is R installed?".to_string(),
                logs_excerpt: "Cannot execute Rscript. Please ensure R is installed and in PATH."
                    .to_string(),
            };
            return report.render(params.response_format);
        }
        Err(e) => return Err(e),
    };

    evaluate(&output, timeout_seconds, app_filename).render(params.response_format)
}

fn evaluate(output: &RunOutput, timeout_seconds: u64, app_filename: &str) -> StartupReport {
    let reached_listening = matches(r"(?i)Listening on|Starting Shiny", &output.combined_output());

    if output.timed_out {
        if reached_listening {
            StartupReport {
                status: "ok",
                error_type: None,
                message: "App started successfully (reached listening state)".to_string(),
                logs_excerpt: log_excerpt(&output.stdout, &output.stderr, 20),
            }
        } else {
            StartupReport {
                status: "error",
                error_type: Some("timeout"),
                message: format!("App did not start within {timeout_seconds} seconds"),
                logs_excerpt: log_excerpt(&output.stdout, &output.stderr, 30),
            }
        }
    } else if output.status == Some(0) || reached_listening {
        StartupReport {
            status: "ok",
            error_type: None,
            message: "App started successfully".to_string(),
            logs_excerpt: log_excerpt(&output.stdout, &output.stderr, 20),
        }
    } else {
        let (error_type, message) = classify_error(&output.stderr, &output.stdout, app_filename);
        StartupReport {
            status: "error",
            error_type,
            message,
            logs_excerpt: log_excerpt(&output.stdout, &output.stderr, 30),
        }
    }
}

/// Map R output onto a failure class; first match wins.
fn classify_error(stderr: &str, stdout: &str, app_filename: &str) -> (Option<&'static str>, String) {
    let combined = format!("{stderr}\n{stdout}");

    if matches(
        r"(?i)there is no package called|could not find package",
        &combined,
    ) {
        let message = match capture(r#"package called ['"]([^'"]+)['"]"#, &combined) {
            Some(package) => format!("Missing R package: {package}"),
            None => "Missing R package".to_string(),
        };
        return (Some("missing_package"), message);
    }

    if matches(r"(?i)unexpected|syntax error", &combined) {
        return (
            Some("syntax_error"),
            format!("R syntax error in {app_filename}"),
        );
    }

    if matches(r"(?i)object .* not found|Error in .* : object", &combined) {
        let message = match capture(r#"object ['"]?([^'" ]+)['"]? not found"#, &combined) {
            Some(object) => format!("Object not found: {object}"),
            None => "Object not found".to_string(),
        };
        return (Some("object_not_found"), message);
    }

    if matches(
        r"(?i)cannot open the connection|could not resolve host",
        &combined,
    ) {
        return (
            Some("connection_error"),
            "Network or file connection error".to_string(),
        );
    }

    if matches(r"Error|error:", &combined) {
        let message = capture(r"Error[:\s]+([^\n]+)", &combined)
            .map(|m| m.trim().to_string())
            .unwrap_or_else(|| "R execution error".to_string());
        return (Some("execution_error"), message);
    }

    (None, "Unknown error".to_string())
}

fn matches(pattern: &str, text: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    Some(re.captures(text)?.get(1)?.as_str().to_string())
}

/// Bounded excerpt, stderr section first; older lines drop off the top.
fn log_excerpt(stdout: &str, stderr: &str, max_lines: usize) -> String {
    let mut combined = String::new();
    if !stderr.trim().is_empty() {
        combined.push_str("=== STDERR ===\n");
        combined.push_str(stderr.trim());
        combined.push_str("\n\n");
    }
    if !stdout.trim().is_empty() {
        combined.push_str("=== STDOUT ===\n");
        combined.push_str(stdout.trim());
    }
    if combined.trim().is_empty() {
        return "No output captured".to_string();
    }

    let lines: Vec<&str> = combined.split('\n').collect();
    if lines.len() > max_lines {
        let mut excerpt = vec!["... (output truncated) ..."];
        excerpt.extend(&lines[lines.len() - max_lines..]);
        excerpt.join("\n")
    } else {
        combined
    }
}

fn directory_contents(dir: &Path) -> String {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names.join(", ")
        }
        Err(_) => "directory does not exist".to_string(),
    }
}
