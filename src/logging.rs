use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging with console output plus a daily-rotated JSON file.
///
/// The file sink lands in `logs/` by default; set `TEALFLOW_LOG_DIR` to
/// relocate it. `RUST_LOG` overrides the default `tealflow_server=info`
/// filter.
pub fn init_logging() {
    let log_dir = std::env::var("TEALFLOW_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "tealflow.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tealflow_server=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // The writer guard must outlive main so buffered logs are flushed
    std::mem::forget(guard);
}
