//! DigitalOcean implementation of [`CloudApi`]

use crate::api::*;
use crate::client::{CloudClient, envelope};
use async_trait::async_trait;
use shipyard_cloud::{
    Account, CancellationToken, CertificateSpec, CloudApi, CloudError, ComputeSpec,
    DatabaseConnection, DnsRecordSpec, DomainSpec, FirewallRule, FirewallSpec, LoadBalancerSpec,
    ManagedDatabaseSpec, MonitoringSpec, ProvisionedDatabase, Resource, ResourceKind,
    ResourceWaiter, Result, SshKeySpec, StatusTarget,
};

const COMPUTE_TARGET: StatusTarget = StatusTarget {
    ready: "active",
    failures: &["errored", "archive"],
};

const DATABASE_TARGET: StatusTarget = StatusTarget {
    ready: "online",
    failures: &["errored", "failed"],
};

/// Collection endpoint of each resource kind
fn collection_path(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::SshKey => "/v2/account/keys",
        ResourceKind::Compute => "/v2/droplets",
        ResourceKind::Database => "/v2/databases",
        ResourceKind::Firewall => "/v2/firewalls",
        ResourceKind::LoadBalancer => "/v2/load_balancers",
        ResourceKind::Domain => "/v2/domains",
        ResourceKind::Certificate => "/v2/certificates",
        ResourceKind::Monitoring => "/v2/monitoring/alerts",
    }
}

/// Droplet and key ids are numeric on the wire
fn numeric_id(kind: ResourceKind, id: &str) -> Result<u64> {
    id.parse().map_err(|_| {
        CloudError::Config(format!("{} id '{}' is not numeric", kind.display_name(), id))
    })
}

fn inbound(rule: &FirewallRule) -> InboundRule {
    InboundRule {
        protocol: rule.protocol.to_string(),
        ports: rule.ports.clone(),
        sources: Addresses {
            addresses: rule.addresses.clone(),
        },
    }
}

fn outbound(rule: &FirewallRule) -> OutboundRule {
    OutboundRule {
        protocol: rule.protocol.to_string(),
        ports: rule.ports.clone(),
        destinations: Addresses {
            addresses: rule.addresses.clone(),
        },
    }
}

impl CloudClient {
    async fn get_database(&self, id: &str) -> Result<ApiDatabase> {
        envelope(self.get(&format!("/v2/databases/{}", id)).await?, "database")
    }

    /// Create the application database inside the cluster. An existing
    /// database with the same name is accepted.
    async fn ensure_app_database(&self, cluster_id: &str, name: &str) -> Result<()> {
        let body = serde_json::json!({ "name": name });
        match self
            .post(&format!("/v2/databases/{}/dbs", cluster_id), &body)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.status(), Some(409 | 422)) => {
                tracing::debug!(cluster_id, name, "application database already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Wait for a requested cluster, then create the application database
    /// and collect the connection details
    async fn complete_database(
        &self,
        created: ApiDatabase,
        spec: &ManagedDatabaseSpec,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedDatabase> {
        let id = created.id.as_str();
        ResourceWaiter::new(self.database_wait)
            .wait_for_status(ResourceKind::Database, id, DATABASE_TARGET, cancel, || async {
                self.get_database(id).await.map(|db| Resource::from(&db))
            })
            .await?;

        self.ensure_app_database(id, &spec.database).await?;

        // The final fetch carries the connection details of the online cluster
        let online = self.get_database(id).await?;
        let conn = online
            .connection
            .clone()
            .or(created.connection)
            .ok_or_else(|| {
                CloudError::UnexpectedResponse(format!("database {} has no connection info", id))
            })?;

        let mut resource = Resource::from(&online);
        resource.set_attribute("database", serde_json::json!(spec.database));

        Ok(ProvisionedDatabase {
            resource,
            connection: DatabaseConnection {
                host: conn.host,
                port: conn.port,
                database: spec.database.clone(),
                user: conn.user,
                password: conn.password,
                require_tls: conn.ssl,
            },
        })
    }

    async fn create_record(
        &self,
        domain: &str,
        record: &DnsRecordSpec,
        address: &str,
    ) -> Result<u64> {
        let request = CreateDomainRecordRequest {
            record_type: &record.record_type,
            name: &record.name,
            data: address,
            ttl: record.ttl,
        };
        let created: ApiDomainRecord = envelope(
            self.post(&format!("/v2/domains/{}/records", domain), &request)
                .await?,
            "domain_record",
        )?;
        tracing::debug!(
            domain,
            record = %created.name,
            record_type = %created.record_type,
            data = %created.data,
            "DNS record created"
        );
        Ok(created.id)
    }
}

#[async_trait]
impl CloudApi for CloudClient {
    fn name(&self) -> &str {
        "digitalocean"
    }

    fn readiness(&self, kind: ResourceKind) -> Option<StatusTarget> {
        match kind {
            ResourceKind::Compute => Some(COMPUTE_TARGET),
            ResourceKind::Database => Some(DATABASE_TARGET),
            _ => None,
        }
    }

    async fn who_am_i(&self) -> Result<Account> {
        let account: ApiAccount = envelope(self.get("/v2/account").await?, "account")?;
        Ok(Account {
            email: account.email,
            uuid: account.uuid,
            status: account.status,
        })
    }

    async fn upload_key(&self, spec: &SshKeySpec, public_key: &str) -> Result<Resource> {
        let request = CreateSshKeyRequest {
            name: &spec.name,
            public_key: public_key.trim(),
        };
        let key: ApiSshKey = envelope(
            self.post(collection_path(ResourceKind::SshKey), &request)
                .await?,
            "ssh_key",
        )?;
        tracing::info!(id = key.id, name = %key.name, "SSH key uploaded");
        Ok(key.into())
    }

    async fn create_compute(
        &self,
        spec: &ComputeSpec,
        user_data: &str,
        cancel: &CancellationToken,
    ) -> Result<Resource> {
        let ssh_keys = spec
            .ssh_key_ids()
            .iter()
            .map(|id| numeric_id(ResourceKind::SshKey, id))
            .collect::<Result<Vec<_>>>()?;

        let request = CreateDropletRequest {
            name: &spec.name,
            region: &spec.region,
            size: &spec.size,
            image: &spec.image,
            ssh_keys,
            backups: spec.backups.is_some(),
            backup_policy: spec.backups.as_ref().map(|b| BackupPolicy {
                plan: &b.plan,
                weekday: &b.weekday,
                hour: b.hour,
            }),
            monitoring: spec.monitoring_agent,
            ipv6: false,
            tags: &spec.tags,
            user_data,
        };

        let droplet: ApiDroplet = envelope(
            self.post(collection_path(ResourceKind::Compute), &request)
                .await?,
            "droplet",
        )?;
        let id = droplet.id.to_string();
        tracing::info!(
            id = %id,
            name = %droplet.name,
            status = %droplet.status,
            "droplet requested"
        );
        let requested = Resource::from(droplet);

        let polled = ResourceWaiter::new(self.compute_wait)
            .wait_for_status(ResourceKind::Compute, &id, COMPUTE_TARGET, cancel, || {
                self.get_compute(&id)
            })
            .await
            .map_err(|e| CloudError::incomplete(ResourceKind::Compute, requested, e))?;
        tracing::info!(id = %id, polls = polled.polls, "droplet active");
        Ok(polled.value)
    }

    async fn get_compute(&self, id: &str) -> Result<Resource> {
        let droplet: ApiDroplet =
            envelope(self.get(&format!("/v2/droplets/{}", id)).await?, "droplet")?;
        Ok(droplet.into())
    }

    async fn create_database_cluster(
        &self,
        spec: &ManagedDatabaseSpec,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedDatabase> {
        let request = CreateDatabaseRequest {
            name: &spec.name,
            engine: &spec.engine,
            version: &spec.version,
            size: &spec.size,
            region: &spec.region,
            num_nodes: spec.num_nodes,
            tags: &spec.tags,
        };
        let created: ApiDatabase = envelope(
            self.post(collection_path(ResourceKind::Database), &request)
                .await?,
            "database",
        )?;
        tracing::info!(
            id = %created.id,
            name = %created.name,
            status = %created.status,
            "database cluster requested"
        );
        let mut requested = Resource::from(&created);
        requested.set_attribute("database", serde_json::json!(spec.database));

        self.complete_database(created, spec, cancel)
            .await
            .map_err(|e| CloudError::incomplete(ResourceKind::Database, requested, e))
    }

    async fn create_firewall(&self, spec: &FirewallSpec, compute_id: &str) -> Result<Resource> {
        let request = CreateFirewallRequest {
            name: &spec.name,
            inbound_rules: spec.inbound.iter().map(inbound).collect(),
            outbound_rules: spec.outbound.iter().map(outbound).collect(),
            droplet_ids: vec![numeric_id(ResourceKind::Compute, compute_id)?],
            tags: &spec.tags,
        };
        let firewall: ApiFirewall = envelope(
            self.post(collection_path(ResourceKind::Firewall), &request)
                .await?,
            "firewall",
        )?;
        tracing::info!(id = %firewall.id, name = %firewall.name, "firewall created");
        Ok(firewall.into())
    }

    async fn create_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        compute_id: &str,
    ) -> Result<Resource> {
        let request = CreateLoadBalancerRequest {
            name: &spec.name,
            region: &spec.region,
            forwarding_rules: spec
                .forwarding_rules
                .iter()
                .map(|r| ApiForwardingRule {
                    entry_protocol: &r.entry_protocol,
                    entry_port: r.entry_port,
                    target_protocol: &r.target_protocol,
                    target_port: r.target_port,
                    tls_passthrough: r.tls_passthrough,
                })
                .collect(),
            health_check: ApiHealthCheck {
                protocol: &spec.health_check.protocol,
                port: spec.health_check.port,
                path: &spec.health_check.path,
                check_interval_seconds: 10,
                response_timeout_seconds: 5,
                healthy_threshold: 3,
                unhealthy_threshold: 3,
            },
            droplet_ids: vec![numeric_id(ResourceKind::Compute, compute_id)?],
        };
        let lb: ApiLoadBalancer = envelope(
            self.post(collection_path(ResourceKind::LoadBalancer), &request)
                .await?,
            "load_balancer",
        )?;
        tracing::info!(id = %lb.id, name = %lb.name, status = %lb.status, "load balancer requested");
        Ok(lb.into())
    }

    async fn create_domain(&self, spec: &DomainSpec, address: &str) -> Result<Resource> {
        let domain: ApiDomain = envelope(
            self.post(
                collection_path(ResourceKind::Domain),
                &CreateDomainRequest { name: &spec.name },
            )
            .await?,
            "domain",
        )?;
        tracing::info!(domain = %domain.name, "domain created");

        let mut resource = Resource::new(&domain.name, &domain.name, "active");
        if let Some(ttl) = domain.ttl {
            resource.set_attribute("ttl", serde_json::json!(ttl));
        }
        resource.set_attribute("address", serde_json::json!(address));

        let mut record_ids = Vec::with_capacity(spec.records.len());
        for record in &spec.records {
            match self.create_record(&domain.name, record, address).await {
                Ok(id) => record_ids.push(id),
                Err(e) => {
                    // Records go with the domain when it is deleted
                    resource.set_attribute("record_ids", serde_json::json!(record_ids));
                    return Err(CloudError::incomplete(ResourceKind::Domain, resource, e));
                }
            }
        }
        resource.set_attribute("record_ids", serde_json::json!(record_ids));
        Ok(resource)
    }

    async fn create_certificate(&self, spec: &CertificateSpec) -> Result<Resource> {
        let request = CreateCertificateRequest {
            name: &spec.name,
            certificate_type: "lets_encrypt",
            dns_names: &spec.dns_names,
        };
        let cert: ApiCertificate = envelope(
            self.post(collection_path(ResourceKind::Certificate), &request)
                .await?,
            "certificate",
        )?;
        tracing::info!(id = %cert.id, name = %cert.name, state = %cert.state, "certificate requested");
        Ok(cert.into())
    }

    async fn create_alert_policy(
        &self,
        spec: &MonitoringSpec,
        compute_id: &str,
    ) -> Result<Resource> {
        let request = CreateAlertPolicyRequest {
            alerts: AlertTargets {
                email: &spec.emails,
                slack: Vec::new(),
            },
            compare: &spec.comparison,
            description: &spec.description,
            enabled: true,
            entities: vec![compute_id.to_string()],
            tags: Vec::new(),
            metric: &spec.metric,
            value: spec.threshold,
            window: &spec.window,
        };
        let policy: ApiAlertPolicy = envelope(
            self.post(collection_path(ResourceKind::Monitoring), &request)
                .await?,
            "policy",
        )?;
        tracing::info!(id = %policy.uuid, "alert policy created");
        Ok(policy.into())
    }

    async fn delete(&self, kind: ResourceKind, resource: &Resource) -> Result<()> {
        let path = format!("{}/{}", collection_path(kind), resource.id);
        match self.delete_path(&path).await {
            Ok(()) => {
                tracing::info!(kind = %kind, id = %resource.id, "deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(kind = %kind, id = %resource.id, "already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_cloud::Protocol;

    #[test]
    fn test_readiness_targets() {
        let client = CloudClient::new("token").unwrap();
        assert_eq!(client.readiness(ResourceKind::Compute), Some(COMPUTE_TARGET));
        assert_eq!(client.readiness(ResourceKind::Database).unwrap().ready, "online");
        assert_eq!(client.readiness(ResourceKind::Firewall), None);
    }

    #[test]
    fn test_firewall_rules_keep_ports() {
        let rule = outbound(&FirewallRule::open(Protocol::Udp, "all"));
        assert_eq!(rule.protocol, "udp");
        assert_eq!(rule.ports, "all");
        assert_eq!(inbound(&FirewallRule::open(Protocol::Tcp, "22")).ports, "22");
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id(ResourceKind::Compute, "3164444").unwrap(), 3164444);
        assert!(numeric_id(ResourceKind::Compute, "abc").is_err());
    }
}
