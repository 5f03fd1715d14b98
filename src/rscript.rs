//! R interpreter collaborator.
//!
//! Every invocation is bounded by a caller-supplied timeout and the child is
//! killed and reaped on expiry, so no orphaned R processes survive a slow or
//! hung script.

use crate::error::{Result, TealflowError};
use crate::metrics;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// Captured outcome of one interpreter run.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Exit code when the process finished on its own.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }

    /// stderr followed by stdout, the order diagnostics are most useful in.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stderr, self.stdout)
    }
}

#[async_trait]
pub trait RScriptRunner: Send + Sync {
    /// Run a single R expression (`Rscript -e <expression>`).
    async fn run_expression(
        &self,
        expression: &str,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<RunOutput>;

    /// Run a script file (`Rscript <file>`) in a working directory with
    /// additional environment variables.
    async fn run_script(
        &self,
        script_file: &str,
        cwd: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<RunOutput>;

    /// Cheap availability probe (`Rscript --version`).
    async fn is_available(&self) -> bool;
}

/// Production runner shelling out to the configured Rscript binary.
pub struct SystemRScript {
    command: String,
}

impl SystemRScript {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<RunOutput> {
        let mut command = Command::new(&self.command);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        for (key, value) in env {
            command.env(key, value);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TealflowError::RscriptNotFound
            } else {
                TealflowError::Io(e)
            }
        })?;

        // Drain both pipes concurrently so a chatty child never deadlocks
        // against a full pipe buffer while we wait on it.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => {
                debug!("Rscript exceeded {:?}, killing process", timeout);
                let _ = child.start_kill();
                // Reap so the killed child never lingers as a zombie
                let _ = child.wait().await;
                None
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let output = RunOutput {
            status: status.and_then(|s| s.code()),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            timed_out: status.is_none(),
        };
        metrics::record_rscript_run(
            started.elapsed().as_secs_f64(),
            output.timed_out,
            output.success(),
        );
        Ok(output)
    }
}

#[async_trait]
impl RScriptRunner for SystemRScript {
    async fn run_expression(
        &self,
        expression: &str,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<RunOutput> {
        self.run(&["-e", expression], cwd, &[], timeout).await
    }

    async fn run_script(
        &self,
        script_file: &str,
        cwd: &Path,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<RunOutput> {
        self.run(&[script_file], Some(cwd), env, timeout).await
    }

    async fn is_available(&self) -> bool {
        matches!(
            self.run(&["--version"], None, &[], Duration::from_secs(10)).await,
            Ok(output) if output.success()
        )
    }
}

/// Fetch the Rd help page for a module, degrading to a short notice when the
/// interpreter or the package is unavailable.
pub async fn fetch_r_help(
    runner: &dyn RScriptRunner,
    module_name: &str,
    package_name: &str,
    timeout: Duration,
) -> String {
    let expression = format!(
        "db <- tools::Rd_db(\"{pkg}\"); rd <- db[[\"{module}.Rd\"]]; \
         if (is.null(rd)) stop(\"no help page\") else tools::Rd2txt(rd)",
        pkg = package_name,
        module = module_name
    );
    match runner.run_expression(&expression, None, timeout).await {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => output.stdout,
        Ok(output) if output.timed_out => "R help not available: help lookup timed out".to_string(),
        Ok(output) => format!(
            "R help not available: {}",
            first_error_line(&output.stderr).unwrap_or("no help page found")
        ),
        Err(e) => format!("R help not available: {}", e),
    }
}

fn first_error_line(stderr: &str) -> Option<&str> {
    stderr.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Canned runner for exercising tools without an R installation.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    pub struct StaticRunner {
        pub expression_output: RunOutput,
        pub script_output: RunOutput,
        pub available: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticRunner {
        pub fn succeeding(stdout: &str) -> Self {
            let output = RunOutput {
                status: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
                timed_out: false,
            };
            Self {
                expression_output: output.clone(),
                script_output: output,
                available: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(stderr: &str) -> Self {
            let output = RunOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
                timed_out: false,
            };
            Self {
                expression_output: output.clone(),
                script_output: output,
                available: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn timing_out() -> Self {
            let output = RunOutput {
                status: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            };
            Self {
                expression_output: output.clone(),
                script_output: output,
                available: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn unavailable() -> Self {
            Self {
                expression_output: RunOutput::default(),
                script_output: RunOutput::default(),
                available: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn recorded_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RScriptRunner for StaticRunner {
        async fn run_expression(
            &self,
            expression: &str,
            _cwd: Option<&Path>,
            _timeout: Duration,
        ) -> Result<RunOutput> {
            if !self.available {
                return Err(TealflowError::RscriptNotFound);
            }
            self.calls.lock().unwrap().push(expression.to_string());
            Ok(self.expression_output.clone())
        }

        async fn run_script(
            &self,
            script_file: &str,
            _cwd: &Path,
            _env: &[(String, String)],
            _timeout: Duration,
        ) -> Result<RunOutput> {
            if !self.available {
                return Err(TealflowError::RscriptNotFound);
            }
            self.calls.lock().unwrap().push(script_file.to_string());
            Ok(self.script_output.clone())
        }

        async fn is_available(&self) -> bool {
            self.available
        }
    }
}
