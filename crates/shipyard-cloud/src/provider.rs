//! Cloud provider trait definition

use crate::error::Result;
use crate::plan::{
    CertificateSpec, ComputeSpec, DomainSpec, FirewallSpec, LoadBalancerSpec,
    ManagedDatabaseSpec, MonitoringSpec, SshKeySpec,
};
use crate::resource::{Account, DatabaseConnection, Resource, ResourceKind};
use crate::waiter::StatusTarget;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Provider abstraction used by the orchestrator and the teardown tool.
///
/// Creation methods for resources that activate asynchronously (compute,
/// database) only return once the resource reached its ready status.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Returns the provider name (e.g., "digitalocean")
    fn name(&self) -> &str;

    /// Ready and terminal-failure statuses for kinds that have to be waited on
    fn readiness(&self, kind: ResourceKind) -> Option<StatusTarget>;

    /// Validate the API token
    async fn who_am_i(&self) -> Result<Account>;

    async fn upload_key(&self, spec: &SshKeySpec, public_key: &str) -> Result<Resource>;

    async fn create_compute(
        &self,
        spec: &ComputeSpec,
        user_data: &str,
        cancel: &CancellationToken,
    ) -> Result<Resource>;

    /// Re-fetch a compute instance (status, addresses)
    async fn get_compute(&self, id: &str) -> Result<Resource>;

    async fn create_database_cluster(
        &self,
        spec: &ManagedDatabaseSpec,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedDatabase>;

    async fn create_firewall(&self, spec: &FirewallSpec, compute_id: &str) -> Result<Resource>;

    async fn create_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        compute_id: &str,
    ) -> Result<Resource>;

    /// Create the domain and its records pointing at `address`
    async fn create_domain(&self, spec: &DomainSpec, address: &str) -> Result<Resource>;

    async fn create_certificate(&self, spec: &CertificateSpec) -> Result<Resource>;

    async fn create_alert_policy(&self, spec: &MonitoringSpec, compute_id: &str)
    -> Result<Resource>;

    /// Delete a recorded resource. A resource that is already gone is not an error.
    async fn delete(&self, kind: ResourceKind, resource: &Resource) -> Result<()>;
}

/// A managed database cluster together with its connection details
#[derive(Debug, Clone)]
pub struct ProvisionedDatabase {
    pub resource: Resource,
    pub connection: DatabaseConnection,
}
