//! Declarative infrastructure plan
//!
//! A [`Plan`] describes everything a deployment should create. It is derived
//! from the user configuration without talking to any provider; optional
//! specs are `None` when the corresponding feature is turned off and the
//! orchestrator skips that step.

use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub project: String,
    pub region: String,
    pub ssh_key: Option<SshKeySpec>,
    pub compute: ComputeSpec,
    pub database: DatabaseSpec,
    pub firewall: Option<FirewallSpec>,
    pub load_balancer: Option<LoadBalancerSpec>,
    pub domain: Option<DomainSpec>,
    pub certificate: Option<CertificateSpec>,
    pub monitoring: Option<MonitoringSpec>,
    /// Cloud-init user data handed to the compute instance
    pub bootstrap_script: String,
}

impl Plan {
    /// Kinds this plan will create, in creation order
    pub fn resource_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds = Vec::new();
        if self.ssh_key.is_some() {
            kinds.push(ResourceKind::SshKey);
        }
        kinds.push(ResourceKind::Compute);
        if self.database.is_managed() {
            kinds.push(ResourceKind::Database);
        }
        if self.firewall.is_some() {
            kinds.push(ResourceKind::Firewall);
        }
        if self.load_balancer.is_some() {
            kinds.push(ResourceKind::LoadBalancer);
        }
        if self.domain.is_some() {
            kinds.push(ResourceKind::Domain);
        }
        if self.certificate.is_some() {
            kinds.push(ResourceKind::Certificate);
        }
        if self.monitoring.is_some() {
            kinds.push(ResourceKind::Monitoring);
        }
        kinds
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.resource_kinds().len(),
            local_database: !self.database.is_managed(),
            backups: self.compute.backups.is_some(),
        }
    }
}

/// Summary of a plan for display
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub local_database: bool,
    pub backups: bool,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources to create, database {}, backups {}",
            self.create,
            if self.local_database { "on instance" } else { "managed" },
            if self.backups { "on" } else { "off" }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeySpec {
    pub name: String,
    pub public_key_path: PathBuf,
}

/// Slot for the SSH key attached to the compute instance.
///
/// The planner cannot know the provider key id, so it leaves the slot
/// [`KeySlot::Pending`] and the orchestrator fills it after the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "id")]
pub enum KeySlot {
    Unused,
    Pending,
    Filled(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSpec {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_key: KeySlot,
    pub tags: Vec<String>,
    pub monitoring_agent: bool,
    /// Weekly backup policy, folded into the instance creation request
    pub backups: Option<BackupSpec>,
}

impl ComputeSpec {
    /// Copy of the spec with the uploaded key id placed in the key slot
    pub fn with_ssh_key(&self, key_id: impl Into<String>) -> Self {
        Self {
            ssh_key: KeySlot::Filled(key_id.into()),
            ..self.clone()
        }
    }

    pub fn ssh_key_ids(&self) -> Vec<String> {
        match &self.ssh_key {
            KeySlot::Filled(id) => vec![id.clone()],
            KeySlot::Unused | KeySlot::Pending => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DatabaseSpec {
    /// Provider-managed cluster, created through the provider API
    Managed(ManagedDatabaseSpec),
    /// Database installed on the compute instance by the bootstrap script
    Local(LocalDatabaseSpec),
}

impl DatabaseSpec {
    pub fn is_managed(&self) -> bool {
        matches!(self, DatabaseSpec::Managed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDatabaseSpec {
    pub name: String,
    pub engine: String,
    pub version: String,
    pub size: String,
    pub region: String,
    pub num_nodes: u32,
    pub database: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDatabaseSpec {
    pub engine: String,
    pub database: String,
    pub user: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub protocol: Protocol,
    /// Single port, range (`8000-9000`) or `all`
    pub ports: String,
    /// Sources for inbound rules, destinations for outbound rules
    pub addresses: Vec<String>,
}

impl FirewallRule {
    pub fn open(protocol: Protocol, ports: impl Into<String>) -> Self {
        Self {
            protocol,
            ports: ports.into(),
            addresses: vec!["0.0.0.0/0".to_string(), "::/0".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSpec {
    pub name: String,
    pub inbound: Vec<FirewallRule>,
    pub outbound: Vec<FirewallRule>,
    pub tags: Vec<String>,
}

impl FirewallSpec {
    pub fn allows_inbound(&self, port: u16) -> bool {
        let port = port.to_string();
        self.inbound.iter().any(|r| r.ports == port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub entry_protocol: String,
    pub entry_port: u16,
    pub target_protocol: String,
    pub target_port: u16,
    pub tls_passthrough: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub protocol: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub region: String,
    pub forwarding_rules: Vec<ForwardingRule>,
    pub health_check: HealthCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordSpec {
    pub record_type: String,
    pub name: String,
    pub ttl: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub name: String,
    /// Records pointing at the instance's public address
    pub records: Vec<DnsRecordSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub name: String,
    pub dns_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSpec {
    pub description: String,
    pub metric: String,
    pub comparison: String,
    pub threshold: u32,
    pub window: String,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSpec {
    pub plan: String,
    pub weekday: String,
    pub hour: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute() -> ComputeSpec {
        ComputeSpec {
            name: "shop-app".into(),
            region: "nyc3".into(),
            size: "s-1vcpu-2gb".into(),
            image: "ubuntu-24-04-x64".into(),
            ssh_key: KeySlot::Pending,
            tags: vec!["shop".into()],
            monitoring_agent: true,
            backups: None,
        }
    }

    #[test]
    fn test_key_slot_patch() {
        let spec = compute();
        assert!(spec.ssh_key_ids().is_empty());

        let patched = spec.with_ssh_key("512190");
        assert_eq!(patched.ssh_key_ids(), vec!["512190".to_string()]);
        assert_eq!(patched.name, spec.name);
        assert_eq!(spec.ssh_key, KeySlot::Pending);
    }

    #[test]
    fn test_firewall_allows_inbound() {
        let spec = FirewallSpec {
            name: "fw".into(),
            inbound: vec![FirewallRule::open(Protocol::Tcp, "22")],
            outbound: vec![],
            tags: vec![],
        };
        assert!(spec.allows_inbound(22));
        assert!(!spec.allows_inbound(443));
    }
}
