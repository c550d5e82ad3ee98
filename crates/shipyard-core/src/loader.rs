//! Configuration loading and validation

use crate::error::{ConfigError, Result};
use crate::model::{Configuration, DatabaseMode};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Provider resource names are limited to 63 characters and the longest
/// derived suffix is `-deploy-key`
const MAX_PROJECT_NAME: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Format::Json),
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Read, parse and validate a configuration file
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_configuration(path: &Path) -> Result<Configuration> {
    let format =
        Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let config = parse_str(&content, format).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })?;

    info!(project = %config.project_name, "Configuration loaded");
    Ok(config)
}

/// Parse and validate configuration text
pub fn parse_str(content: &str, format: Format) -> Result<Configuration> {
    debug!(?format, size = content.len(), "Parsing configuration");
    let config: Configuration = match format {
        Format::Json => serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?,
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?,
    };
    validate(&config)?;
    Ok(config)
}

/// Reject configurations the planner or the bootstrap script cannot handle
pub fn validate(config: &Configuration) -> Result<()> {
    validate_project_name(&config.project_name)?;

    if let Some(domain) = &config.domain {
        validate_domain(domain)?;
    }

    if config.database_type == DatabaseMode::Local
        && config
            .credentials
            .database_password
            .as_deref()
            .is_none_or(str::is_empty)
    {
        return Err(ConfigError::Invalid(
            "credentials.databasePassword is required when databaseType is 'local'".into(),
        ));
    }

    if config.credentials.app_secret.is_empty() {
        return Err(ConfigError::Invalid(
            "credentials.appSecret must not be empty".into(),
        ));
    }

    if config.features.monitoring == Some(true) && config.admin_email.is_none() {
        return Err(ConfigError::Invalid(
            "features.monitoring requires adminEmail for alert notifications".into(),
        ));
    }

    for key in config.credentials.extra.keys() {
        if !is_env_name(key) {
            return Err(ConfigError::Invalid(format!(
                "credentials.extra key '{}' is not a valid environment variable name",
                key
            )));
        }
    }

    // Secrets are written into the instance's environment file verbatim
    for (key, value) in config.secrets() {
        if value.contains('\'') || value.contains('\n') || value.contains('\r') {
            return Err(ConfigError::Invalid(format!(
                "secret {} must not contain quotes or line breaks",
                key
            )));
        }
    }

    Ok(())
}

fn validate_project_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PROJECT_NAME
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "projectName '{}' must be 1-{} characters of lowercase letters, digits and '-', starting with a letter",
            name, MAX_PROJECT_NAME
        )))
    }
}

fn validate_domain(domain: &str) -> Result<()> {
    let valid = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.starts_with("www.")
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "domain '{}' must be an apex domain such as example.com",
            domain
        )))
    }
}

fn is_env_name(key: &str) -> bool {
    key.starts_with(|c: char| c.is_ascii_uppercase() || c == '_')
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LOCAL: &str = r#"{
        "projectName": "shop",
        "databaseType": "local",
        "credentials": { "databasePassword": "db-pw", "appSecret": "app-secret" }
    }"#;

    #[test]
    fn test_load_json_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("shipyard.json");
        fs::write(&path, LOCAL).unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.project_name, "shop");
    }

    #[test]
    fn test_load_yaml_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("shipyard.yaml");
        fs::write(
            &path,
            "projectName: shop\n\
             databaseType: managed\n\
             domain: shop.example\n\
             credentials:\n  appSecret: app-secret\n\
             features:\n  enableSSL: true\n  backups: true\n",
        )
        .unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.domain.as_deref(), Some("shop.example"));
        assert_eq!(config.features.backups, Some(true));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("shipyard.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_configuration(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path.ends_with("shipyard.json")));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_configuration(Path::new("shipyard.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_local_mode_requires_database_password() {
        let err = parse_str(
            r#"{"projectName":"shop","databaseType":"local","credentials":{"appSecret":"s"}}"#,
            Format::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("databasePassword"));
    }

    #[test]
    fn test_project_name_rules() {
        assert!(validate_project_name("shop-2").is_ok());
        assert!(validate_project_name("Shop").is_err());
        assert!(validate_project_name("2shop").is_err());
        assert!(validate_project_name("shop-").is_err());
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name(&"a".repeat(41)).is_err());
    }

    #[test]
    fn test_domain_rules() {
        assert!(validate_domain("shop.example").is_ok());
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("https://shop.example").is_err());
        assert!(validate_domain("www.shop.example").is_err());
    }

    #[test]
    fn test_secret_with_quote_rejected() {
        let err = parse_str(
            r#"{"projectName":"shop","databaseType":"local",
                "credentials":{"databasePassword":"it's","appSecret":"s"}}"#,
            Format::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_PASSWORD"));
    }

    #[test]
    fn test_extra_keys_must_be_env_names() {
        let err = parse_str(
            r#"{"projectName":"shop","databaseType":"managed",
                "credentials":{"appSecret":"s","extra":{"stripe-key":"x"}}}"#,
            Format::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("stripe-key"));
    }

    #[test]
    fn test_monitoring_requires_admin_email() {
        let err = parse_str(
            r#"{"projectName":"shop","databaseType":"managed",
                "credentials":{"appSecret":"s"},"features":{"monitoring":true}}"#,
            Format::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("adminEmail"));
    }
}
