//! DigitalOcean API v2 wire types

use serde::{Deserialize, Serialize};
use shipyard_cloud::Resource;

/// Error body returned with every non-2xx response
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[allow(dead_code)]
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
}

// ============ Account ============

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAccount {
    pub email: String,
    pub uuid: String,
    pub status: String,
}

// ============ SSH keys ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateSshKeyRequest<'a> {
    pub name: &'a str,
    pub public_key: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiSshKey {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl From<ApiSshKey> for Resource {
    fn from(key: ApiSshKey) -> Self {
        Resource::new(key.id.to_string(), key.name, "active")
            .with_attribute("fingerprint", serde_json::json!(key.fingerprint))
    }
}

// ============ Droplets ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateDropletRequest<'a> {
    pub name: &'a str,
    pub region: &'a str,
    pub size: &'a str,
    pub image: &'a str,
    pub ssh_keys: Vec<u64>,
    pub backups: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_policy: Option<BackupPolicy<'a>>,
    pub monitoring: bool,
    pub ipv6: bool,
    pub tags: &'a [String],
    pub user_data: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct BackupPolicy<'a> {
    pub plan: &'a str,
    pub weekday: &'a str,
    pub hour: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDroplet {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub size_slug: Option<String>,
    #[serde(default)]
    pub region: Option<ApiRegion>,
    #[serde(default)]
    pub networks: ApiNetworks,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRegion {
    pub slug: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiNetworks {
    #[serde(default)]
    pub v4: Vec<ApiNetworkV4>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiNetworkV4 {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub network_type: String,
}

impl ApiDroplet {
    fn address(&self, network_type: &str) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|n| n.network_type == network_type)
            .map(|n| n.ip_address.as_str())
    }
}

impl From<ApiDroplet> for Resource {
    fn from(droplet: ApiDroplet) -> Self {
        let mut resource = Resource::new(droplet.id.to_string(), &droplet.name, &droplet.status);
        if let Some(ip) = droplet.address("public") {
            resource.set_attribute("public_ipv4", serde_json::json!(ip));
        }
        if let Some(ip) = droplet.address("private") {
            resource.set_attribute("private_ipv4", serde_json::json!(ip));
        }
        if let Some(region) = &droplet.region {
            resource.set_attribute("region", serde_json::json!(region.slug));
        }
        if let Some(size) = &droplet.size_slug {
            resource.set_attribute("size", serde_json::json!(size));
        }
        resource
    }
}

// ============ Databases ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateDatabaseRequest<'a> {
    pub name: &'a str,
    pub engine: &'a str,
    pub version: &'a str,
    pub size: &'a str,
    pub region: &'a str,
    pub num_nodes: u32,
    pub tags: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDatabase {
    pub id: String,
    pub name: String,
    pub engine: String,
    pub status: String,
    #[serde(default)]
    pub connection: Option<ApiConnection>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
}

impl From<&ApiDatabase> for Resource {
    fn from(db: &ApiDatabase) -> Self {
        let mut resource = Resource::new(&db.id, &db.name, &db.status)
            .with_attribute("engine", serde_json::json!(db.engine));
        // The password stays out of the state file
        if let Some(conn) = &db.connection {
            resource.set_attribute("host", serde_json::json!(conn.host));
            resource.set_attribute("port", serde_json::json!(conn.port));
            resource.set_attribute("user", serde_json::json!(conn.user));
            resource.set_attribute("database", serde_json::json!(conn.database));
        }
        resource
    }
}

// ============ Firewalls ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateFirewallRequest<'a> {
    pub name: &'a str,
    pub inbound_rules: Vec<InboundRule>,
    pub outbound_rules: Vec<OutboundRule>,
    pub droplet_ids: Vec<u64>,
    pub tags: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct InboundRule {
    pub protocol: String,
    pub ports: String,
    pub sources: Addresses,
}

#[derive(Debug, Serialize)]
pub(crate) struct OutboundRule {
    pub protocol: String,
    pub ports: String,
    pub destinations: Addresses,
}

#[derive(Debug, Serialize)]
pub(crate) struct Addresses {
    pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiFirewall {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl From<ApiFirewall> for Resource {
    fn from(fw: ApiFirewall) -> Self {
        Resource::new(fw.id, fw.name, fw.status)
    }
}

// ============ Load balancers ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateLoadBalancerRequest<'a> {
    pub name: &'a str,
    pub region: &'a str,
    pub forwarding_rules: Vec<ApiForwardingRule<'a>>,
    pub health_check: ApiHealthCheck<'a>,
    pub droplet_ids: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiForwardingRule<'a> {
    pub entry_protocol: &'a str,
    pub entry_port: u16,
    pub target_protocol: &'a str,
    pub target_port: u16,
    pub tls_passthrough: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiHealthCheck<'a> {
    pub protocol: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub check_interval_seconds: u32,
    pub response_timeout_seconds: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLoadBalancer {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub ip: Option<String>,
}

impl From<ApiLoadBalancer> for Resource {
    fn from(lb: ApiLoadBalancer) -> Self {
        let mut resource = Resource::new(lb.id, lb.name, lb.status);
        if let Some(ip) = lb.ip.filter(|ip| !ip.is_empty()) {
            resource.set_attribute("ip", serde_json::json!(ip));
        }
        resource
    }
}

// ============ Domains ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateDomainRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDomain {
    pub name: String,
    #[serde(default)]
    pub ttl: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateDomainRecordRequest<'a> {
    #[serde(rename = "type")]
    pub record_type: &'a str,
    pub name: &'a str,
    pub data: &'a str,
    pub ttl: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDomainRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub data: String,
}

// ============ Certificates ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateCertificateRequest<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub certificate_type: &'a str,
    pub dns_names: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCertificate {
    pub id: String,
    pub name: String,
    pub state: String,
}

impl From<ApiCertificate> for Resource {
    fn from(cert: ApiCertificate) -> Self {
        Resource::new(cert.id, cert.name, cert.state)
    }
}

// ============ Monitoring ============

#[derive(Debug, Serialize)]
pub(crate) struct CreateAlertPolicyRequest<'a> {
    pub alerts: AlertTargets<'a>,
    pub compare: &'a str,
    pub description: &'a str,
    pub enabled: bool,
    pub entities: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub metric: &'a str,
    pub value: u32,
    pub window: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AlertTargets<'a> {
    pub email: &'a [String],
    pub slack: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAlertPolicy {
    pub uuid: String,
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
}

impl From<ApiAlertPolicy> for Resource {
    fn from(policy: ApiAlertPolicy) -> Self {
        let status = if policy.enabled { "enabled" } else { "disabled" };
        Resource::new(policy.uuid, policy.description, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_droplet_addresses() {
        let droplet: ApiDroplet = serde_json::from_value(serde_json::json!({
            "id": 3164444,
            "name": "shop-app",
            "status": "active",
            "size_slug": "s-1vcpu-2gb",
            "region": { "slug": "nyc3" },
            "networks": {
                "v4": [
                    { "ip_address": "10.128.192.124", "type": "private" },
                    { "ip_address": "203.0.113.10", "type": "public" }
                ]
            }
        }))
        .unwrap();

        let resource = Resource::from(droplet);
        assert_eq!(resource.id, "3164444");
        assert_eq!(resource.attribute_str("public_ipv4"), Some("203.0.113.10"));
        assert_eq!(resource.attribute_str("private_ipv4"), Some("10.128.192.124"));
        assert_eq!(resource.attribute_str("region"), Some("nyc3"));
    }

    #[test]
    fn test_database_resource_has_no_password() {
        let db: ApiDatabase = serde_json::from_value(serde_json::json!({
            "id": "9cc10173-e9ea-4176-9dbc-a4cee4c4ff30",
            "name": "shop-db",
            "engine": "pg",
            "status": "online",
            "connection": {
                "host": "shop-db.b.db.ondigitalocean.com",
                "port": 25060,
                "user": "doadmin",
                "password": "s3cr3t-from-provider",
                "database": "defaultdb",
                "ssl": true
            }
        }))
        .unwrap();

        let resource = Resource::from(&db);
        let json = serde_json::to_string(&resource).unwrap();
        assert!(!json.contains("s3cr3t-from-provider"));
        assert_eq!(resource.attribute::<u16>("port"), Some(25060));
    }
}
