//! Infrastructure planner
//!
//! A pure function from [`Configuration`] to [`Plan`]: no provider calls, no
//! clock, no randomness. Planning the same configuration twice yields equal
//! plans. This module is the only place that knows the defaults.

use crate::bootstrap::render_bootstrap;
use crate::error::{ConfigError, Result};
use crate::loader::validate;
use crate::model::{Configuration, DatabaseMode};
use shipyard_cloud::{
    BackupSpec, CertificateSpec, ComputeSpec, DatabaseSpec, DnsRecordSpec, DomainSpec,
    FirewallRule, FirewallSpec, ForwardingRule, HealthCheck, KeySlot, LoadBalancerSpec,
    LocalDatabaseSpec, ManagedDatabaseSpec, MonitoringSpec, Plan, Protocol, SshKeySpec,
};
use tracing::{info, instrument, warn};

pub const DEFAULT_REGION: &str = "nyc3";
pub const DEFAULT_INSTANCE_SIZE: &str = "s-1vcpu-2gb";
pub const DEFAULT_IMAGE: &str = "ubuntu-24-04-x64";
pub const DEFAULT_DATABASE_ENGINE: &str = "pg";
pub const DEFAULT_DATABASE_VERSION: &str = "16";
pub const DEFAULT_DATABASE_SIZE: &str = "db-s-1vcpu-1gb";
pub const DEFAULT_APP_PORT: u16 = 3000;
pub const LOCAL_DATABASE_PORT: u16 = 5432;
const DNS_TTL: u32 = 1800;
const CPU_ALERT_THRESHOLD: u32 = 80;

/// Feature defaults applied when the configuration leaves a toggle unset
#[derive(Debug, Clone, Copy)]
struct Toggles {
    ssl: bool,
    monitoring: bool,
    backups: bool,
    firewall: bool,
    load_balancer: bool,
}

impl Toggles {
    fn resolve(config: &Configuration) -> Self {
        let f = &config.features;
        Self {
            ssl: f.enable_ssl.unwrap_or(false),
            monitoring: f.monitoring.unwrap_or(false),
            backups: f.backups.unwrap_or(false),
            firewall: f.firewall.unwrap_or(true),
            load_balancer: f.load_balancer.unwrap_or(false),
        }
    }
}

/// Derives a [`Plan`] from a [`Configuration`]
#[derive(Debug, Clone, Copy, Default)]
pub struct InfrastructurePlanner;

impl InfrastructurePlanner {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, config), fields(project = %config.project_name))]
    pub fn plan(&self, config: &Configuration) -> Result<Plan> {
        validate(config)?;
        let toggles = Toggles::resolve(config);
        let project = config.project_name.as_str();
        let region = config.region.as_deref().unwrap_or(DEFAULT_REGION);
        let tags = vec![project.to_string(), "shipyard".to_string()];

        if toggles.ssl && config.domain.is_none() {
            warn!("enableSSL is set without a domain; no certificate will be requested");
        }

        let ssh_key = config.ssh_public_key_path.as_ref().map(|path| SshKeySpec {
            name: format!("{}-deploy-key", project),
            public_key_path: path.clone(),
        });

        let compute = ComputeSpec {
            name: format!("{}-app", project),
            region: region.to_string(),
            size: config
                .instance_size
                .as_deref()
                .unwrap_or(DEFAULT_INSTANCE_SIZE)
                .to_string(),
            image: DEFAULT_IMAGE.to_string(),
            ssh_key: if ssh_key.is_some() {
                KeySlot::Pending
            } else {
                KeySlot::Unused
            },
            tags: tags.clone(),
            monitoring_agent: toggles.monitoring,
            backups: toggles.backups.then(|| BackupSpec {
                plan: "weekly".to_string(),
                weekday: "SUN".to_string(),
                hour: 4,
            }),
        };

        let database = database_spec(config, region, &tags);

        let firewall = toggles
            .firewall
            .then(|| firewall_spec(project, toggles.ssl, &tags));

        let load_balancer = toggles
            .load_balancer
            .then(|| load_balancer_spec(project, region, toggles.ssl));

        let domain = config.domain.as_ref().map(|name| DomainSpec {
            name: name.clone(),
            records: ["@", "www"]
                .iter()
                .map(|record| DnsRecordSpec {
                    record_type: "A".to_string(),
                    name: record.to_string(),
                    ttl: DNS_TTL,
                })
                .collect(),
        });

        let certificate = match (&config.domain, toggles.ssl) {
            (Some(domain), true) => Some(CertificateSpec {
                name: format!("{}-cert", project),
                dns_names: vec![domain.clone(), format!("www.{}", domain)],
            }),
            _ => None,
        };

        let monitoring = if toggles.monitoring {
            let email = config.admin_email.clone().ok_or_else(|| {
                ConfigError::Invalid("features.monitoring requires adminEmail".into())
            })?;
            Some(MonitoringSpec {
                description: format!("{} CPU above {}%", project, CPU_ALERT_THRESHOLD),
                metric: "v1/insights/droplet/cpu".to_string(),
                comparison: "GreaterThan".to_string(),
                threshold: CPU_ALERT_THRESHOLD,
                window: "5m".to_string(),
                emails: vec![email],
            })
        } else {
            None
        };

        let bootstrap_script = render_bootstrap(config, &database, DEFAULT_APP_PORT, toggles.ssl)?;

        let plan = Plan {
            project: project.to_string(),
            region: region.to_string(),
            ssh_key,
            compute,
            database,
            firewall,
            load_balancer,
            domain,
            certificate,
            monitoring,
            bootstrap_script,
        };
        info!(summary = %plan.summary(), "Plan ready");
        Ok(plan)
    }
}

/// `shop-api` becomes `shop_api`: PostgreSQL identifiers avoid dashes
fn database_identifier(project: &str) -> String {
    project.replace('-', "_")
}

fn database_spec(config: &Configuration, region: &str, tags: &[String]) -> DatabaseSpec {
    let project = config.project_name.as_str();
    match config.database_type {
        DatabaseMode::Managed => DatabaseSpec::Managed(ManagedDatabaseSpec {
            name: format!("{}-db", project),
            engine: DEFAULT_DATABASE_ENGINE.to_string(),
            version: DEFAULT_DATABASE_VERSION.to_string(),
            size: DEFAULT_DATABASE_SIZE.to_string(),
            region: region.to_string(),
            num_nodes: 1,
            database: database_identifier(project),
            tags: tags.to_vec(),
        }),
        DatabaseMode::Local => DatabaseSpec::Local(LocalDatabaseSpec {
            engine: "postgresql".to_string(),
            database: database_identifier(project),
            user: database_identifier(project),
            port: LOCAL_DATABASE_PORT,
        }),
    }
}

fn firewall_spec(project: &str, ssl: bool, tags: &[String]) -> FirewallSpec {
    let mut inbound = vec![
        FirewallRule::open(Protocol::Tcp, "22"),
        FirewallRule::open(Protocol::Tcp, "80"),
    ];
    if ssl {
        inbound.push(FirewallRule::open(Protocol::Tcp, "443"));
    }
    FirewallSpec {
        name: format!("{}-firewall", project),
        inbound,
        outbound: vec![
            FirewallRule::open(Protocol::Tcp, "all"),
            FirewallRule::open(Protocol::Udp, "all"),
        ],
        tags: tags.to_vec(),
    }
}

fn load_balancer_spec(project: &str, region: &str, ssl: bool) -> LoadBalancerSpec {
    let mut forwarding_rules = vec![ForwardingRule {
        entry_protocol: "http".to_string(),
        entry_port: 80,
        target_protocol: "http".to_string(),
        target_port: 80,
        tls_passthrough: false,
    }];
    if ssl {
        forwarding_rules.push(ForwardingRule {
            entry_protocol: "https".to_string(),
            entry_port: 443,
            target_protocol: "https".to_string(),
            target_port: 443,
            tls_passthrough: true,
        });
    }
    LoadBalancerSpec {
        name: format!("{}-lb", project),
        region: region.to_string(),
        forwarding_rules,
        health_check: HealthCheck {
            protocol: "http".to_string(),
            port: 80,
            path: "/".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credentials, Features};
    use std::collections::BTreeMap;

    fn base() -> Configuration {
        Configuration {
            project_name: "shop-api".into(),
            region: None,
            instance_size: None,
            domain: None,
            database_type: DatabaseMode::Managed,
            credentials: Credentials {
                api_token: None,
                database_password: None,
                app_secret: "s".into(),
                admin_password: None,
                extra: BTreeMap::new(),
            },
            features: Features::default(),
            ssh_public_key_path: None,
            admin_email: None,
        }
    }

    #[test]
    fn test_defaults_applied() {
        let plan = InfrastructurePlanner::new().plan(&base()).unwrap();

        assert_eq!(plan.region, DEFAULT_REGION);
        assert_eq!(plan.compute.size, DEFAULT_INSTANCE_SIZE);
        assert_eq!(plan.compute.ssh_key, KeySlot::Unused);
        assert!(plan.firewall.is_some());
        assert!(plan.load_balancer.is_none());
        assert!(plan.monitoring.is_none());
        assert!(plan.compute.backups.is_none());
        match &plan.database {
            DatabaseSpec::Managed(db) => {
                assert_eq!(db.num_nodes, 1);
                assert_eq!(db.database, "shop_api");
            }
            other => panic!("expected managed database, got {other:?}"),
        }
    }

    #[test]
    fn test_firewall_rules_follow_ssl() {
        let mut config = base();
        let plan = InfrastructurePlanner::new().plan(&config).unwrap();
        let fw = plan.firewall.unwrap();
        assert!(fw.allows_inbound(22));
        assert!(fw.allows_inbound(80));
        assert!(!fw.allows_inbound(443));

        config.features.enable_ssl = Some(true);
        let plan = InfrastructurePlanner::new().plan(&config).unwrap();
        assert!(plan.firewall.unwrap().allows_inbound(443));
    }

    #[test]
    fn test_outbound_allows_all_tcp_and_udp_only() {
        for ssl in [false, true] {
            let mut config = base();
            config.features.enable_ssl = Some(ssl);
            let fw = InfrastructurePlanner::new().plan(&config).unwrap().firewall.unwrap();
            assert_eq!(
                fw.outbound,
                vec![
                    FirewallRule::open(Protocol::Tcp, "all"),
                    FirewallRule::open(Protocol::Udp, "all"),
                ]
            );
        }
    }

    #[test]
    fn test_firewall_can_be_disabled() {
        let mut config = base();
        config.features.firewall = Some(false);
        let plan = InfrastructurePlanner::new().plan(&config).unwrap();
        assert!(plan.firewall.is_none());
    }

    #[test]
    fn test_certificate_needs_domain_and_ssl() {
        let mut config = base();
        config.features.enable_ssl = Some(true);
        assert!(InfrastructurePlanner::new().plan(&config).unwrap().certificate.is_none());

        config.domain = Some("shop.example".into());
        let plan = InfrastructurePlanner::new().plan(&config).unwrap();
        let cert = plan.certificate.unwrap();
        assert_eq!(cert.dns_names, vec!["shop.example", "www.shop.example"]);
        assert_eq!(plan.domain.unwrap().records.len(), 2);
    }

    #[test]
    fn test_ssh_key_fills_slot_later() {
        let mut config = base();
        config.ssh_public_key_path = Some("/home/ops/.ssh/id_ed25519.pub".into());
        let plan = InfrastructurePlanner::new().plan(&config).unwrap();

        assert_eq!(plan.ssh_key.unwrap().name, "shop-api-deploy-key");
        assert_eq!(plan.compute.ssh_key, KeySlot::Pending);
    }

    #[test]
    fn test_load_balancer_forwards_https_with_ssl() {
        let mut config = base();
        config.features.load_balancer = Some(true);
        config.features.enable_ssl = Some(true);
        let lb = InfrastructurePlanner::new()
            .plan(&config)
            .unwrap()
            .load_balancer
            .unwrap();

        let ports: Vec<u16> = lb.forwarding_rules.iter().map(|r| r.entry_port).collect();
        assert_eq!(ports, vec![80, 443]);
    }

    #[test]
    fn test_monitoring_and_backups() {
        let mut config = base();
        config.features.monitoring = Some(true);
        config.features.backups = Some(true);
        config.admin_email = Some("ops@shop.example".into());
        let plan = InfrastructurePlanner::new().plan(&config).unwrap();

        let monitoring = plan.monitoring.unwrap();
        assert_eq!(monitoring.emails, vec!["ops@shop.example"]);
        assert!(plan.compute.monitoring_agent);
        assert_eq!(plan.compute.backups.unwrap().plan, "weekly");
    }
}
