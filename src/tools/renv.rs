//! renv environment management.
//!
//! Two tools share this module: `setup` walks a project through renv
//! bootstrap, package installation and an initial snapshot; `snapshot`
//! refreshes the lockfile of an already-initialized project. Both stop at
//! the first failed step and report which steps ran. Error reports are
//! always JSON so agents can branch on `error_type`; markdown is honored
//! on the success path only.

use super::AppContext;
use crate::constants::{PACKAGE_INSTALL_TIMEOUT_SECS, REQUIRED_R_PACKAGES};
use crate::error::Result;
use crate::render::ResponseFormat;
use crate::rscript::RunOutput;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const LOG_TAIL_CHARS: usize = 2000;

const INSTALL_RENV_CMD: &str = "if (!requireNamespace(\"renv\", quietly = TRUE)) \
     install.packages(\"renv\", repos = \"https://cloud.r-project.org\")";
const INIT_RENV_CMD: &str =
    "if (!file.exists(\"renv.lock\")) renv::init(bare = TRUE) else renv::activate()";
const SNAPSHOT_CMD: &str = "renv::snapshot(prompt = FALSE)";

fn default_project_path() -> String {
    ".".to_string()
}

fn default_format() -> ResponseFormat {
    ResponseFormat::Json
}

#[derive(Debug, Deserialize)]
pub struct SetupParams {
    #[serde(default = "default_project_path")]
    pub project_path: String,
    #[serde(default = "default_format")]
    pub response_format: ResponseFormat,
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            response_format: default_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapshotParams {
    #[serde(default = "default_project_path")]
    pub project_path: String,
    #[serde(default = "default_format")]
    pub response_format: ResponseFormat,
}

impl Default for SnapshotParams {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            response_format: default_format(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SetupReport {
    status: &'static str,
    error_type: Option<&'static str>,
    steps_completed: Vec<&'static str>,
    message: String,
    logs_excerpt: String,
}

#[derive(Debug, Serialize)]
struct SnapshotReport {
    status: &'static str,
    error_type: Option<&'static str>,
    message: String,
    logs_excerpt: String,
}

/// Accumulates interpreter output across steps.
#[derive(Default)]
struct LogCollector {
    entries: Vec<String>,
}

impl LogCollector {
    fn record(&mut self, output: &RunOutput) {
        if !output.stdout.trim().is_empty() {
            self.entries.push(format!("STDOUT:\n{}", output.stdout.trim()));
        }
        if !output.stderr.trim().is_empty() {
            self.entries.push(format!("STDERR:\n{}", output.stderr.trim()));
        }
    }

    fn joined(&self) -> String {
        self.entries.join("\n")
    }

    /// Last `LOG_TAIL_CHARS` characters for success reports.
    fn tail(&self) -> String {
        let joined = self.joined();
        let chars: Vec<char> = joined.chars().collect();
        if chars.len() > LOG_TAIL_CHARS {
            chars[chars.len() - LOG_TAIL_CHARS..].iter().collect()
        } else {
            joined
        }
    }
}

fn install_packages_cmd() -> String {
    let quoted: Vec<String> = REQUIRED_R_PACKAGES
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect();
    format!("renv::install(c({}), prompt = FALSE)", quoted.join(", "))
}

async fn run_r(
    ctx: &AppContext,
    command: &str,
    cwd: &Path,
    timeout: Duration,
    logs: &mut LogCollector,
) -> Result<RunOutput> {
    let output = ctx.rscript.run_expression(command, Some(cwd), timeout).await?;
    logs.record(&output);
    Ok(output)
}

fn setup_error(
    error_type: &'static str,
    message: impl Into<String>,
    steps: &[&'static str],
    logs: &LogCollector,
) -> Result<String> {
    let report = SetupReport {
        status: "error",
        error_type: Some(error_type),
        steps_completed: steps.to_vec(),
        message: message.into(),
        logs_excerpt: logs.joined(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub async fn setup(ctx: &AppContext, params: SetupParams) -> Result<String> {
    let project_path = Path::new(&params.project_path);
    let mut steps: Vec<&'static str> = Vec::new();
    let mut logs = LogCollector::default();

    if !project_path.exists() {
        return setup_error(
            "filesystem_error",
            format!("Project path does not exist: {}", project_path.display()),
            &steps,
            &logs,
        );
    }

    if !ctx.rscript.is_available().await {
        return setup_error(
            "rscript_not_found",
            "Rscript command not found. Please install R.",
            &steps,
            &logs,
        );
    }

    let output = run_r(ctx, INSTALL_RENV_CMD, project_path, ctx.rscript_timeout(), &mut logs).await?;
    if !output.success() {
        return setup_error(
            "renv_install_failed",
            "Failed to install renv package.",
            &steps,
            &logs,
        );
    }
    steps.push("renv_installed");

    let output = run_r(ctx, INIT_RENV_CMD, project_path, ctx.rscript_timeout(), &mut logs).await?;
    if !output.success() {
        return setup_error(
            "renv_install_failed",
            "Failed to initialize renv.",
            &steps,
            &logs,
        );
    }
    steps.push("renv_initialized");

    let output = run_r(
        ctx,
        &install_packages_cmd(),
        project_path,
        Duration::from_secs(PACKAGE_INSTALL_TIMEOUT_SECS),
        &mut logs,
    )
    .await?;
    if output.timed_out {
        return setup_error(
            "package_install_failed",
            "Package installation timed out.",
            &steps,
            &logs,
        );
    }
    if !output.success() {
        return setup_error(
            "package_install_failed",
            "Failed to install required packages.",
            &steps,
            &logs,
        );
    }
    steps.push("packages_installed");

    let output = run_r(ctx, SNAPSHOT_CMD, project_path, ctx.rscript_timeout(), &mut logs).await?;
    if !output.success() {
        return setup_error(
            "snapshot_failed",
            "Failed to create renv snapshot.",
            &steps,
            &logs,
        );
    }
    steps.push("snapshot_created");

    let report = SetupReport {
        status: "ok",
        error_type: None,
        steps_completed: steps,
        message: "Renv environment set up successfully.".to_string(),
        logs_excerpt: logs.tail(),
    };
    Ok(match params.response_format {
        ResponseFormat::Markdown => setup_markdown(&report),
        ResponseFormat::Json => serde_json::to_string_pretty(&report)?,
    })
}

fn setup_markdown(report: &SetupReport) -> String {
    let emoji = if report.status == "ok" { "✅" } else { "❌" };
    let mut md = format!(
        "# {} Setup Environment: {}\n\n",
        emoji,
        report.status.to_uppercase()
    );
    if let Some(error_type) = report.error_type {
        md.push_str(&format!("**Error Type:** `{}`\n\n", error_type));
    }
    md.push_str(&format!("**Message:** {}\n\n", report.message));
    if !report.steps_completed.is_empty() {
        md.push_str("### Steps Completed\n");
        for step in &report.steps_completed {
            md.push_str(&format!("- {}\n", step));
        }
        md.push('\n');
    }
    if !report.logs_excerpt.trim().is_empty() {
        md.push_str("### Implementation Logs\n```\n");
        md.push_str(&report.logs_excerpt);
        md.push_str("\n```\n");
    }
    md
}

fn snapshot_error(error_type: &'static str, message: impl Into<String>, logs: &LogCollector) -> Result<String> {
    let report = SnapshotReport {
        status: "error",
        error_type: Some(error_type),
        message: message.into(),
        logs_excerpt: logs.joined(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub async fn snapshot(ctx: &AppContext, params: SnapshotParams) -> Result<String> {
    let project_path = Path::new(&params.project_path);
    let mut logs = LogCollector::default();

    if !project_path.exists() {
        return snapshot_error(
            "filesystem_error",
            format!("Project path does not exist: {}", project_path.display()),
            &logs,
        );
    }

    if !ctx.rscript.is_available().await {
        return snapshot_error(
            "rscript_not_found",
            "Rscript command not found. Please install R.",
            &logs,
        );
    }

    if !project_path.join("renv").exists() {
        return snapshot_error(
            "renv_not_initialized",
            "renv is not initialized in this project. \
             Please run tealflow_setup_renv_environment first.",
            &logs,
        );
    }

    let output = run_r(ctx, SNAPSHOT_CMD, project_path, ctx.rscript_timeout(), &mut logs).await?;
    if !output.success() {
        return snapshot_error("snapshot_failed", "Failed to create renv snapshot.", &logs);
    }

    let report = SnapshotReport {
        status: "ok",
        error_type: None,
        message: "Renv snapshot created successfully.".to_string(),
        logs_excerpt: logs.tail(),
    };
    Ok(match params.response_format {
        ResponseFormat::Markdown => snapshot_markdown(&report),
        ResponseFormat::Json => serde_json::to_string_pretty(&report)?,
    })
}

fn snapshot_markdown(report: &SnapshotReport) -> String {
    let emoji = if report.status == "ok" { "✅" } else { "❌" };
    let mut md = format!(
        "# {} Snapshot Environment: {}\n\n",
        emoji,
        report.status.to_uppercase()
    );
    if let Some(error_type) = report.error_type {
        md.push_str(&format!("**Error Type:** `{}`\n\n", error_type));
    }
    md.push_str(&format!("**Message:** {}\n\n", report.message));
    if !report.logs_excerpt.trim().is_empty() {
        md.push_str("### Snapshot Logs\n```\n");
        md.push_str(&report.logs_excerpt);
        md.push_str("\n```\n");
    }
    md
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::error::TealflowError;
    use crate::rscript::testing::StaticRunner;
    use crate::rscript::RScriptRunner;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Returns queued outputs one call at a time.
    struct SequenceRunner {
        outputs: Mutex<VecDeque<RunOutput>>,
    }

    impl SequenceRunner {
        fn new(outputs: Vec<RunOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
            }
        }
    }

    #[async_trait]
    impl RScriptRunner for SequenceRunner {
        async fn run_expression(
            &self,
            _expression: &str,
            _cwd: Option<&Path>,
            _timeout: Duration,
        ) -> crate::error::Result<RunOutput> {
            self.outputs
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(TealflowError::RscriptNotFound)
        }

        async fn run_script(
            &self,
            _script_file: &str,
            _cwd: &Path,
            _env: &[(String, String)],
            _timeout: Duration,
        ) -> crate::error::Result<RunOutput> {
            Ok(RunOutput::default())
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn ok_output(stdout: &str) -> RunOutput {
        RunOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    fn timed_out_output() -> RunOutput {
        RunOutput {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    fn parse(out: &str) -> serde_json::Value {
        serde_json::from_str(out).unwrap()
    }

    fn setup_params(dir: &Path) -> SetupParams {
        SetupParams {
            project_path: dir.to_string_lossy().into_owned(),
            ..SetupParams::default()
        }
    }

    fn snapshot_params(dir: &Path) -> SnapshotParams {
        SnapshotParams {
            project_path: dir.to_string_lossy().into_owned(),
            ..SnapshotParams::default()
        }
    }

    #[tokio::test]
    async fn setup_runs_all_four_steps() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(StaticRunner::succeeding("* Lockfile written to renv.lock"));
        let ctx = testing::context_with(testing::small_catalog(), runner.clone());

        let out = setup(&ctx, setup_params(dir.path())).await.unwrap();
        let report = parse(&out);
        assert_eq!(report["status"], "ok");
        assert_eq!(report["message"], "Renv environment set up successfully.");
        assert_eq!(
            report["steps_completed"],
            serde_json::json!([
                "renv_installed",
                "renv_initialized",
                "packages_installed",
                "snapshot_created"
            ])
        );

        let calls = runner.recorded_calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].contains("requireNamespace(\"renv\""));
        assert!(calls[1].contains("renv::init(bare = TRUE)"));
        assert!(calls[2].contains("renv::install(c(\"shiny\", \"teal\""));
        assert_eq!(calls[3], "renv::snapshot(prompt = FALSE)");
    }

    #[tokio::test]
    async fn setup_rejects_missing_path() {
        let ctx = testing::context();
        let out = setup(
            &ctx,
            SetupParams {
                project_path: "/definitely/not/a/real/path".to_string(),
                ..SetupParams::default()
            },
        )
        .await
        .unwrap();
        let report = parse(&out);
        assert_eq!(report["error_type"], "filesystem_error");
        assert!(report["message"]
            .as_str()
            .unwrap()
            .starts_with("Project path does not exist:"));
        assert_eq!(report["steps_completed"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn setup_requires_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context_with(
            testing::small_catalog(),
            Arc::new(StaticRunner::unavailable()),
        );

        let out = setup(&ctx, setup_params(dir.path())).await.unwrap();
        let report = parse(&out);
        assert_eq!(report["error_type"], "rscript_not_found");
        assert_eq!(report["message"], "Rscript command not found. Please install R.");
    }

    #[tokio::test]
    async fn setup_stops_at_first_failed_step() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context_with(
            testing::small_catalog(),
            Arc::new(StaticRunner::failing("could not contact CRAN mirror")),
        );

        let out = setup(&ctx, setup_params(dir.path())).await.unwrap();
        let report = parse(&out);
        assert_eq!(report["error_type"], "renv_install_failed");
        assert_eq!(report["message"], "Failed to install renv package.");
        assert_eq!(report["steps_completed"], serde_json::json!([]));
        assert!(report["logs_excerpt"]
            .as_str()
            .unwrap()
            .contains("could not contact CRAN mirror"));
    }

    #[tokio::test]
    async fn setup_reports_package_install_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SequenceRunner::new(vec![
            ok_output("renv ok"),
            ok_output("init ok"),
            timed_out_output(),
        ]);
        let ctx = testing::context_with(testing::small_catalog(), Arc::new(runner));

        let out = setup(&ctx, setup_params(dir.path())).await.unwrap();
        let report = parse(&out);
        assert_eq!(report["error_type"], "package_install_failed");
        assert_eq!(report["message"], "Package installation timed out.");
        assert_eq!(
            report["steps_completed"],
            serde_json::json!(["renv_installed", "renv_initialized"])
        );
    }

    #[tokio::test]
    async fn setup_markdown_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context_with(
            testing::small_catalog(),
            Arc::new(StaticRunner::succeeding("done")),
        );

        let out = setup(
            &ctx,
            SetupParams {
                response_format: ResponseFormat::Markdown,
                ..setup_params(dir.path())
            },
        )
        .await
        .unwrap();
        assert!(out.starts_with("# ✅ Setup Environment: OK"));
        assert!(out.contains("### Steps Completed"));
        assert!(out.contains("- snapshot_created"));
        assert!(out.contains("### Implementation Logs"));
    }

    #[tokio::test]
    async fn snapshot_requires_initialized_renv() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context();

        // Markdown requested, but error reports stay JSON.
        let out = snapshot(
            &ctx,
            SnapshotParams {
                response_format: ResponseFormat::Markdown,
                ..snapshot_params(dir.path())
            },
        )
        .await
        .unwrap();
        let report = parse(&out);
        assert_eq!(report["error_type"], "renv_not_initialized");
        assert_eq!(
            report["message"],
            "renv is not initialized in this project. \
             Please run tealflow_setup_renv_environment first."
        );
    }

    #[tokio::test]
    async fn snapshot_success_reports_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("renv")).unwrap();
        let runner = Arc::new(StaticRunner::succeeding("* Lockfile written to renv.lock"));
        let ctx = testing::context_with(testing::small_catalog(), runner.clone());

        let out = snapshot(&ctx, snapshot_params(dir.path())).await.unwrap();
        let report = parse(&out);
        assert_eq!(report["status"], "ok");
        assert_eq!(report["message"], "Renv snapshot created successfully.");
        assert_eq!(runner.recorded_calls(), vec!["renv::snapshot(prompt = FALSE)"]);
    }

    #[tokio::test]
    async fn snapshot_markdown_on_success() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("renv")).unwrap();
        let ctx = testing::context_with(
            testing::small_catalog(),
            Arc::new(StaticRunner::succeeding("snapshot ok")),
        );

        let out = snapshot(
            &ctx,
            SnapshotParams {
                response_format: ResponseFormat::Markdown,
                ..snapshot_params(dir.path())
            },
        )
        .await
        .unwrap();
        assert!(out.starts_with("# ✅ Snapshot Environment: OK"));
        assert!(out.contains("### Snapshot Logs"));
    }
}
