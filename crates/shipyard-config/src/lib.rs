pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file directly
pub const CONFIG_ENV: &str = "SHIPYARD_CONFIG";

/// Environment variable overriding the API token from the configuration
pub const TOKEN_ENV: &str = "DIGITALOCEAN_TOKEN";

/// Project-local directory holding state, lock and optional configuration
pub const PROJECT_DIR: &str = ".shipyard";

const CANDIDATES: [&str; 4] = [
    "shipyard.local.json",
    "shipyard.json",
    "shipyard.yaml",
    "shipyard.yml",
];

/// Shipyard's directory under the user configuration directory. Lookup only,
/// nothing is created.
fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shipyard"))
}

/// Locate the configuration file, searching from the current directory.
///
/// Order:
/// 1. the explicit path (must exist)
/// 2. `SHIPYARD_CONFIG`
/// 3. current directory: shipyard.local.json, shipyard.json, shipyard.yaml, shipyard.yml
/// 4. `./.shipyard/` with the same names
/// 5. `~/.config/shipyard/shipyard.json`
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;
    find_config_file_in(&current_dir, explicit)
}

/// [`find_config_file`] rooted at `dir` instead of the current directory
pub fn find_config_file_in(dir: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(DiscoveryError::ExplicitPathMissing(path.to_path_buf()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            path = %path.display(),
            "{} points to a missing file, searching",
            CONFIG_ENV
        );
    }

    if let Some(path) = first_existing(dir) {
        return Ok(path);
    }

    let project_dir = dir.join(PROJECT_DIR);
    if project_dir.is_dir()
        && let Some(path) = first_existing(&project_dir)
    {
        return Ok(path);
    }

    if let Some(config_dir) = user_config_dir() {
        let global_config = config_dir.join("shipyard.json");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(DiscoveryError::ConfigFileNotFound)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Pick the API token: `DIGITALOCEAN_TOKEN` wins over the configured value
pub fn resolve_api_token(from_config: Option<&str>) -> Result<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    from_config
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(DiscoveryError::TokenMissing)
}
