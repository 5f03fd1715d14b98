//! Metric recording for the tool server.
//!
//! Provides a straightforward API for recording metrics using the standard
//! Prometheus naming conventions.

use std::fmt;
use std::net::SocketAddr;

/// Enum representing all metric names used in the system
/// This eliminates magic strings and provides compile-time safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    ToolInvocations,
    ToolErrors,
    ToolResponseChars,
    CompatibilityChecks,
    CompatibilityCompatible,
    CompatibilityIncompatible,
    CatalogLookupMisses,
    RscriptRuns,
    RscriptFailures,
    RscriptTimeouts,
    RscriptDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ToolInvocations => "tealflow_tool_invocations_total",
            MetricName::ToolErrors => "tealflow_tool_errors_total",
            MetricName::ToolResponseChars => "tealflow_tool_response_chars",
            MetricName::CompatibilityChecks => "tealflow_compatibility_checks_total",
            MetricName::CompatibilityCompatible => "tealflow_compatibility_compatible_total",
            MetricName::CompatibilityIncompatible => "tealflow_compatibility_incompatible_total",
            MetricName::CatalogLookupMisses => "tealflow_catalog_lookup_misses_total",
            MetricName::RscriptRuns => "tealflow_rscript_runs_total",
            MetricName::RscriptFailures => "tealflow_rscript_failures_total",
            MetricName::RscriptTimeouts => "tealflow_rscript_timeouts_total",
            MetricName::RscriptDuration => "tealflow_rscript_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install the Prometheus exporter for serve mode.
pub fn init_metrics() {
    let port: u16 = std::env::var("TEALFLOW_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!(
                "Prometheus exporter installed and listening on http://{}/metrics",
                addr
            );
        }
        Err(e) => {
            tracing::warn!(
                "Prometheus exporter install failed (possibly already installed): {}",
                e
            );
        }
    }
}

pub fn record_tool_invocation(tool: &str) {
    metrics::counter!(MetricName::ToolInvocations.as_str(), "tool" => tool.to_string())
        .increment(1);
}

pub fn record_tool_error(tool: &str) {
    metrics::counter!(MetricName::ToolErrors.as_str(), "tool" => tool.to_string()).increment(1);
}

pub fn record_tool_response_chars(tool: &str, chars: usize) {
    metrics::histogram!(MetricName::ToolResponseChars.as_str(), "tool" => tool.to_string())
        .record(chars as f64);
}

pub fn record_compatibility_verdict(compatible: bool) {
    metrics::counter!(MetricName::CompatibilityChecks.as_str()).increment(1);
    if compatible {
        metrics::counter!(MetricName::CompatibilityCompatible.as_str()).increment(1);
    } else {
        metrics::counter!(MetricName::CompatibilityIncompatible.as_str()).increment(1);
    }
}

pub fn record_catalog_lookup_miss() {
    metrics::counter!(MetricName::CatalogLookupMisses.as_str()).increment(1);
}

pub fn record_rscript_run(secs: f64, timed_out: bool, success: bool) {
    metrics::counter!(MetricName::RscriptRuns.as_str()).increment(1);
    metrics::histogram!(MetricName::RscriptDuration.as_str()).record(secs);
    if timed_out {
        metrics::counter!(MetricName::RscriptTimeouts.as_str()).increment(1);
    } else if !success {
        metrics::counter!(MetricName::RscriptFailures.as_str()).increment(1);
    }
}
