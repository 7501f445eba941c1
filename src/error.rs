use crate::location::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoclockError {
    #[error("Config file parsing error: {0}")]
    ConfigFileParsingError(#[from] toml::de::Error),
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidConfig { key: &'static str, reason: String },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
