use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(
        "No configuration file found. Looked in:\n\
        - the current directory: shipyard.local.json, shipyard.json, shipyard.yaml, shipyard.yml\n\
        - the ./.shipyard/ directory\n\
        - ~/.config/shipyard/shipyard.json\n\
        Pass a path explicitly or set SHIPYARD_CONFIG"
    )]
    ConfigFileNotFound,

    #[error("Configuration file does not exist: {0}")]
    ExplicitPathMissing(PathBuf),

    #[error(
        "No API token. Set credentials.apiToken in the configuration \
        or the DIGITALOCEAN_TOKEN environment variable"
    )]
    TokenMissing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
