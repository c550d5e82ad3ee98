use shipyard_cloud::CloudError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {path}\nreason: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Failed to parse {path}\nreason: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported configuration format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read SSH public key {path}\nreason: {message}")]
    SshKey { path: PathBuf, message: String },

    #[error("Bootstrap template error: {0}")]
    TemplateRenderError(String),
}

impl From<ConfigError> for CloudError {
    fn from(e: ConfigError) -> Self {
        CloudError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
