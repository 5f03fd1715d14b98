use anyhow::Result;
use clap::Parser;

use tealflow_server::catalog::loader::load_catalog;
use tealflow_server::constants::DEFAULT_SIMILARITY_CUTOFF;

/// Validate a knowledge base directory against the bundled JSON Schemas.
#[derive(Parser, Debug)]
#[command(
    name = "validate-knowledge-base",
    version,
    about = "Validate knowledge base JSON against the bundled schemas"
)]
struct Cli {
    /// Knowledge base directory to validate
    #[arg(long, default_value = "knowledge_base")]
    dir: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match load_catalog(&cli.dir, DEFAULT_SIMILARITY_CUTOFF) {
        Ok(catalog) => {
            println!("valid");
            println!("- modules: {}", catalog.module_count());
            println!("- analysis categories: {}", catalog.categories().len());
            println!("- fingerprint: {}", catalog.fingerprint());
            Ok(())
        }
        Err(e) => {
            eprintln!("invalid:");
            eprintln!("- {e}");
            std::process::exit(1)
        }
    }
}
