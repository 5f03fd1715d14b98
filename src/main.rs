use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use tealflow_server::catalog::loader::load_catalog;
use tealflow_server::catalog::PackageFilter;
use tealflow_server::config::Config;
use tealflow_server::render::ResponseFormat;
use tealflow_server::rscript::SystemRScript;
use tealflow_server::server::start_server;
use tealflow_server::tools::{check_requirements, list_modules, AppContext};
use tealflow_server::{logging, metrics};

#[derive(Parser)]
#[command(name = "tealflow_server")]
#[command(about = "Clinical analysis module advisory server for Teal applications")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP tool server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Check a module's dataset requirements from the command line
    Check {
        /// Module to check, e.g. tm_g_km
        module_name: String,
        /// Available datasets (comma-separated). Defaults to the standard study set
        #[arg(long)]
        datasets: Option<String>,
        /// Output format: markdown or json
        #[arg(long, default_value = "markdown")]
        format: String,
    },
    /// List catalog modules
    List {
        /// Package filter: all, clinical or general
        #[arg(long, default_value = "all")]
        package: String,
        /// Case-insensitive name/description filter
        #[arg(long)]
        category: Option<String>,
        /// Output format: markdown or json
        #[arg(long, default_value = "markdown")]
        format: String,
    },
}

fn parse_format(format: &str) -> ResponseFormat {
    if format.eq_ignore_ascii_case("json") {
        ResponseFormat::Json
    } else {
        ResponseFormat::Markdown
    }
}

fn parse_package(package: &str) -> PackageFilter {
    match package.to_ascii_lowercase().as_str() {
        "clinical" => PackageFilter::Clinical,
        "general" => PackageFilter::General,
        _ => PackageFilter::All,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let config = Config::load_from(&cli.config)?;
    let catalog = Arc::new(
        load_catalog(&config.knowledge_base.dir, config.resolver.similarity_cutoff)
            .context("failed to load knowledge base")?,
    );
    info!(
        modules = catalog.module_count(),
        fingerprint = catalog.fingerprint(),
        "knowledge base loaded"
    );

    match cli.command {
        Commands::Serve { port } => {
            metrics::init_metrics();

            let host = config.server.host.clone();
            let port = port.unwrap_or(config.server.port);
            let rscript = Arc::new(SystemRScript::new(config.rscript.command.clone()));
            let ctx = Arc::new(AppContext::new(catalog, config, rscript));

            start_server(ctx, &host, port)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        Commands::Check {
            module_name,
            datasets,
            format,
        } => {
            let rscript = Arc::new(SystemRScript::new(config.rscript.command.clone()));
            let ctx = AppContext::new(catalog, config, rscript);
            let params = check_requirements::Params {
                module_name,
                available_datasets: datasets.map(|list| {
                    list.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
                response_format: parse_format(&format),
            };
            println!("{}", check_requirements::run(&ctx, params).await?);
        }
        Commands::List {
            package,
            category,
            format,
        } => {
            let rscript = Arc::new(SystemRScript::new(config.rscript.command.clone()));
            let ctx = AppContext::new(catalog, config, rscript);
            let params = list_modules::Params {
                package: parse_package(&package),
                category,
                response_format: parse_format(&format),
            };
            println!("{}", list_modules::run(&ctx, params).await?);
        }
    }

    Ok(())
}
