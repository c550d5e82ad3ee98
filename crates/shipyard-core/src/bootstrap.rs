//! Bootstrap script rendering
//!
//! The compute instance receives a cloud-init shell script rendered with Tera.
//! Every application secret from the configuration is written verbatim to
//! `/etc/<project>/app.env`; nothing else derives these values.

use crate::error::{ConfigError, Result};
use crate::model::Configuration;
use serde::Serialize;
use shipyard_cloud::{DatabaseSpec, LocalDatabaseSpec};
use std::collections::BTreeMap;
use tera::{Context, Tera};
use tracing::debug;

const BOOTSTRAP_TEMPLATE: &str = include_str!("../templates/bootstrap.sh.tera");

/// Values the bootstrap template is rendered with
#[derive(Debug, Serialize)]
struct BootstrapContext<'a> {
    project: &'a str,
    app_user: &'a str,
    app_port: u16,
    domain: Option<&'a str>,
    server_names: String,
    admin_email: Option<&'a str>,
    certbot: bool,
    local_database: bool,
    db_name: Option<&'a str>,
    db_user: Option<&'a str>,
    db_password: Option<&'a str>,
    database_url: Option<String>,
    secrets: BTreeMap<String, String>,
}

/// Render the bootstrap script for `config`
pub fn render_bootstrap(
    config: &Configuration,
    database: &DatabaseSpec,
    app_port: u16,
    ssl: bool,
) -> Result<String> {
    let local = match database {
        DatabaseSpec::Local(spec) => Some(spec),
        DatabaseSpec::Managed(_) => None,
    };
    let password = config.credentials.database_password.as_deref();

    let server_names = match config.domain.as_deref() {
        Some(domain) => format!("{} www.{}", domain, domain),
        None => "_".to_string(),
    };

    let values = BootstrapContext {
        project: &config.project_name,
        app_user: &config.project_name,
        app_port,
        domain: config.domain.as_deref(),
        server_names,
        admin_email: config.admin_email.as_deref(),
        certbot: ssl && config.domain.is_some(),
        local_database: local.is_some(),
        db_name: local.map(|l| l.database.as_str()),
        db_user: local.map(|l| l.user.as_str()),
        db_password: local.and(password),
        database_url: local.zip(password).map(|(l, pw)| local_database_url(l, pw)),
        secrets: config.secrets(),
    };

    let context = Context::from_serialize(&values)
        .map_err(|e| ConfigError::TemplateRenderError(e.to_string()))?;
    let script = Tera::one_off(BOOTSTRAP_TEMPLATE, &context, false)
        .map_err(|e| ConfigError::TemplateRenderError(extract_tera_error_detail(&e)))?;

    debug!(
        project = %config.project_name,
        size = script.len(),
        local_database = values.local_database,
        "Bootstrap script rendered"
    );
    Ok(script)
}

/// Connection string for a database running on the instance itself
pub fn local_database_url(spec: &LocalDatabaseSpec, password: &str) -> String {
    format!(
        "postgresql://{}:{}@localhost:{}/{}",
        spec.user, password, spec.port, spec.database
    )
}

fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    details.join(" | ")
}
