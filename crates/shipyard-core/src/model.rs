//! User configuration
//!
//! The configuration is read once and never mutated afterwards. Optional
//! settings stay `None` here; the planner decides what an absent value means.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Configuration {
    /// Prefix of every provider resource name
    pub project_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_size: Option<String>,

    /// Apex domain served by the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    pub database_type: DatabaseMode,

    pub credentials: Credentials,

    #[serde(default)]
    pub features: Features,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key_path: Option<PathBuf>,

    /// Receives monitoring alerts and certificate notices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseMode {
    /// Provider-managed cluster
    Managed,
    /// PostgreSQL installed on the instance
    Local,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Required in local mode; managed clusters get their password from the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_password: Option<String>,

    pub app_secret: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,

    /// Additional application secrets, written to the instance environment as-is
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field(
                "database_password",
                &self.database_password.as_ref().map(|_| "<redacted>"),
            )
            .field("app_secret", &"<redacted>")
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<redacted>"),
            )
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Feature toggles; `None` means "use the planner default"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Features {
    #[serde(rename = "enableSSL", default, skip_serializing_if = "Option::is_none")]
    pub enable_ssl: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backups: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<bool>,
}

impl Configuration {
    /// Application secrets keyed by environment variable name.
    ///
    /// The API token is a control-plane credential and is not included.
    pub fn secrets(&self) -> BTreeMap<String, String> {
        let creds = &self.credentials;
        let mut secrets = BTreeMap::new();
        secrets.insert("APP_SECRET".to_string(), creds.app_secret.clone());
        if let Some(password) = &creds.database_password {
            secrets.insert("DATABASE_PASSWORD".to_string(), password.clone());
        }
        if let Some(password) = &creds.admin_password {
            secrets.insert("ADMIN_PASSWORD".to_string(), password.clone());
        }
        for (key, value) in &creds.extra {
            secrets.insert(key.clone(), value.clone());
        }
        secrets
    }

    pub fn is_local_database(&self) -> bool {
        self.database_type == DatabaseMode::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let config: Configuration = serde_json::from_value(serde_json::json!({
            "projectName": "shop",
            "databaseType": "local",
            "credentials": {
                "databasePassword": "db-pw",
                "appSecret": "app-secret"
            },
            "features": { "enableSSL": true }
        }))
        .unwrap();

        assert_eq!(config.project_name, "shop");
        assert!(config.is_local_database());
        assert_eq!(config.features.enable_ssl, Some(true));
        assert_eq!(config.features.firewall, None);
        assert_eq!(config.domain, None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<Configuration, _> =
            serde_json::from_value(serde_json::json!({
                "projectName": "shop",
                "databaseType": "local",
                "credentials": { "appSecret": "x" },
                "instanceSzie": "s-1vcpu-1gb"
            }));
        assert!(result.is_err());
    }

    #[test]
    fn test_secrets_exclude_api_token() {
        let config: Configuration = serde_json::from_value(serde_json::json!({
            "projectName": "shop",
            "databaseType": "managed",
            "credentials": {
                "apiToken": "dop_v1_token",
                "appSecret": "app-secret",
                "adminPassword": "admin-pw",
                "extra": { "STRIPE_KEY": "sk_test_1" }
            }
        }))
        .unwrap();

        let secrets = config.secrets();
        assert_eq!(secrets["APP_SECRET"], "app-secret");
        assert_eq!(secrets["ADMIN_PASSWORD"], "admin-pw");
        assert_eq!(secrets["STRIPE_KEY"], "sk_test_1");
        assert!(!secrets.values().any(|v| v == "dop_v1_token"));
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials {
            api_token: Some("dop_v1_token".into()),
            database_password: Some("db-pw".into()),
            app_secret: "app-secret".into(),
            admin_password: None,
            extra: BTreeMap::new(),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("dop_v1_token"));
        assert!(!debug.contains("db-pw"));
        assert!(!debug.contains("app-secret"));
    }
}
