use crate::constants;
use crate::error::{Result, TealflowError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub resolver: ResolverConfig,
    pub rscript: RscriptConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// "single-axis" (default) or "cartesian-product"
    pub combination_mode: String,
    pub similarity_cutoff: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RscriptConfig {
    pub command: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            dir: "knowledge_base".to_string(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            combination_mode: "single-axis".to_string(),
            similarity_cutoff: constants::DEFAULT_SIMILARITY_CUTOFF,
        }
    }
}

impl Default for RscriptConfig {
    fn default() -> Self {
        Self {
            command: "Rscript".to_string(),
            timeout_secs: constants::DEFAULT_RSCRIPT_TIMEOUT_SECS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            knowledge_base: KnowledgeBaseConfig::default(),
            resolver: ResolverConfig::default(),
            rscript: RscriptConfig::default(),
        }
    }
}

impl Config {
    /// Load config.toml when it exists, fall back to defaults otherwise.
    /// Environment variables override file values last.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                TealflowError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            toml::from_str(&config_content)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TEALFLOW_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TEALFLOW_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(dir) = std::env::var("TEALFLOW_KNOWLEDGE_BASE_DIR") {
            self.knowledge_base.dir = dir;
        }
        if let Ok(cmd) = std::env::var("TEALFLOW_RSCRIPT_COMMAND") {
            self.rscript.command = cmd;
        }
    }

    fn validate(&self) -> Result<()> {
        match self.resolver.combination_mode.as_str() {
            "single-axis" | "cartesian-product" => {}
            other => {
                return Err(TealflowError::Config(format!(
                    "Unknown combination_mode '{}' (expected 'single-axis' or 'cartesian-product')",
                    other
                )))
            }
        }
        if !(0.0..=1.0).contains(&self.resolver.similarity_cutoff) {
            return Err(TealflowError::Config(format!(
                "similarity_cutoff {} out of range [0.0, 1.0]",
                self.resolver.similarity_cutoff
            )));
        }
        Ok(())
    }
}
