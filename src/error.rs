use thiserror::Error;

#[derive(Error, Debug)]
pub enum TealflowError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Knowledge base error: {message}")]
    KnowledgeBase { message: String },

    #[error("Tool error: {message}")]
    Tool { message: String },

    #[error("Rscript command not found")]
    RscriptNotFound,
}

pub type Result<T> = std::result::Result<T, TealflowError>;
