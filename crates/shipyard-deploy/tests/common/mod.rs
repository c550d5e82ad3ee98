#![allow(dead_code)]

use async_trait::async_trait;
use shipyard_cloud::{
    Account, CancellationToken, CertificateSpec, CloudApi, CloudError, ComputeSpec,
    DatabaseConnection, DomainSpec, FirewallSpec, LoadBalancerSpec, ManagedDatabaseSpec,
    MonitoringSpec, Plan, ProvisionedDatabase, Resource, ResourceKind, ResourceWaiter, Result,
    SshKeySpec, StateManager, StatusTarget, WaitPolicy,
};
use shipyard_core::{Configuration, Format, InfrastructurePlanner, parse_str};
use shipyard_deploy::{ApplicationInstaller, InstallContext, InstallReport, ReachabilityProbe};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const ADDRESS: &str = "203.0.113.10";
pub const COMPUTE_ID: &str = "3164444";

const COMPUTE_TARGET: StatusTarget = StatusTarget {
    ready: "active",
    failures: &["errored"],
};

pub fn fast_policy() -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(2), Duration::from_millis(200))
}

/// One provider call, numbered in the order it was made
#[derive(Debug, Clone)]
pub struct Call {
    pub seq: usize,
    pub op: &'static str,
    pub target: String,
}

/// Scripted in-memory provider
pub struct MockCloud {
    calls: Mutex<Vec<Call>>,
    compute_statuses: Mutex<Vec<&'static str>>,
    compute_polls: AtomicUsize,
    failures: Mutex<HashMap<&'static str, (u16, String)>>,
    delete_failures: Mutex<HashMap<ResourceKind, (u16, String)>>,
    /// Token cancelled by the given compute fetch
    cancel_on_poll: Mutex<Option<(usize, CancellationToken)>>,
    /// Resource counts read from the state file at every call
    snapshots: Mutex<Vec<usize>>,
    watch: Option<StateManager>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            compute_statuses: Mutex::new(vec!["new", "active"]),
            compute_polls: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
            delete_failures: Mutex::new(HashMap::new()),
            cancel_on_poll: Mutex::new(None),
            snapshots: Mutex::new(Vec::new()),
            watch: None,
        }
    }

    /// Observe the state file at every provider call
    pub fn watching(mut self, manager: StateManager) -> Self {
        self.watch = Some(manager);
        self
    }

    /// Statuses returned by successive compute fetches; the last one repeats
    pub fn with_compute_statuses(self, statuses: Vec<&'static str>) -> Self {
        *self.compute_statuses.lock().unwrap() = statuses;
        self
    }

    /// Cancel `token` while the compute wait is on its `poll`th fetch
    pub fn cancelling_at_poll(self, poll: usize, token: CancellationToken) -> Self {
        *self.cancel_on_poll.lock().unwrap() = Some((poll, token));
        self
    }

    pub fn fail_on(self, op: &'static str, status: u16, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(op, (status, message.to_string()));
        self
    }

    pub fn fail_delete(self, kind: ResourceKind, status: u16, message: &str) -> Self {
        self.delete_failures
            .lock()
            .unwrap()
            .insert(kind, (status, message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.op).collect()
    }

    pub fn called(&self, op: &str) -> bool {
        self.calls().iter().any(|c| c.op == op)
    }

    /// Sequence number of the first call matching `op` and `target`
    pub fn seq_of(&self, op: &str, target: &str) -> Option<usize> {
        self.calls()
            .iter()
            .find(|c| c.op == op && c.target == target)
            .map(|c| c.seq)
    }

    pub fn snapshots(&self) -> Vec<usize> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Scripted failure for a step that is not a call of its own
    fn scripted_failure(&self, op: &str) -> Option<CloudError> {
        self.failures
            .lock()
            .unwrap()
            .get(op)
            .map(|(status, message)| CloudError::provider(*status, message.clone()))
    }

    async fn enter(&self, op: &'static str, target: impl Into<String>) -> Result<()> {
        if let Some(manager) = &self.watch
            && let Ok(Some(state)) = manager.load().await
        {
            self.snapshots.lock().unwrap().push(state.resources.len());
        }

        let mut calls = self.calls.lock().unwrap();
        let seq = calls.len();
        calls.push(Call {
            seq,
            op,
            target: target.into(),
        });
        drop(calls);

        match self.failures.lock().unwrap().get(op) {
            Some((status, message)) => Err(CloudError::provider(*status, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    fn name(&self) -> &str {
        "mock"
    }

    fn readiness(&self, kind: ResourceKind) -> Option<StatusTarget> {
        match kind {
            ResourceKind::Compute => Some(COMPUTE_TARGET),
            ResourceKind::Database => Some(StatusTarget {
                ready: "online",
                failures: &["errored"],
            }),
            _ => None,
        }
    }

    async fn who_am_i(&self) -> Result<Account> {
        self.enter("who_am_i", "account").await?;
        Ok(Account {
            email: "ops@shop.example".into(),
            uuid: "b6fr89dbf6d9156cace5f3c78dc9851d957381ef".into(),
            status: "active".into(),
        })
    }

    async fn upload_key(&self, spec: &SshKeySpec, _public_key: &str) -> Result<Resource> {
        self.enter("upload_key", &spec.name).await?;
        Ok(Resource::new("512190", &spec.name, "active"))
    }

    async fn create_compute(
        &self,
        spec: &ComputeSpec,
        _user_data: &str,
        cancel: &CancellationToken,
    ) -> Result<Resource> {
        self.enter("create_compute", spec.ssh_key_ids().join(",")).await?;
        let requested = Resource::new(COMPUTE_ID, &spec.name, "new");
        let polled = ResourceWaiter::new(fast_policy())
            .wait_for_status(
                ResourceKind::Compute,
                COMPUTE_ID,
                COMPUTE_TARGET,
                cancel,
                || self.get_compute(COMPUTE_ID),
            )
            .await
            .map_err(|e| CloudError::incomplete(ResourceKind::Compute, requested, e))?;
        Ok(polled.value)
    }

    async fn get_compute(&self, id: &str) -> Result<Resource> {
        self.enter("get_compute", id).await?;
        let statuses = self.compute_statuses.lock().unwrap().clone();
        let n = self.compute_polls.fetch_add(1, Ordering::SeqCst);
        let status = statuses[n.min(statuses.len() - 1)];
        if let Some((poll, token)) = self.cancel_on_poll.lock().unwrap().as_ref()
            && n + 1 >= *poll
        {
            token.cancel();
        }
        Ok(Resource::new(id, "shop-app", status)
            .with_attribute("public_ipv4", serde_json::json!(ADDRESS)))
    }

    async fn create_database_cluster(
        &self,
        spec: &ManagedDatabaseSpec,
        _cancel: &CancellationToken,
    ) -> Result<ProvisionedDatabase> {
        self.enter("create_database_cluster", &spec.name).await?;
        Ok(ProvisionedDatabase {
            resource: Resource::new("9cc10173-e9ea-4176-9dbc-a4cee4c4ff30", &spec.name, "online"),
            connection: DatabaseConnection {
                host: "shop-db-do-user-1.db.ondigitalocean.com".into(),
                port: 25060,
                database: spec.database.clone(),
                user: "doadmin".into(),
                password: "managed-pw".into(),
                require_tls: true,
            },
        })
    }

    async fn create_firewall(&self, spec: &FirewallSpec, compute_id: &str) -> Result<Resource> {
        self.enter("create_firewall", compute_id).await?;
        Ok(Resource::new("bb4b2611-3d72-467b-8602-280330ecd65c", &spec.name, "succeeded"))
    }

    async fn create_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        compute_id: &str,
    ) -> Result<Resource> {
        self.enter("create_load_balancer", compute_id).await?;
        Ok(Resource::new("4de7ac8b-495b-4884-9a69-1050c6793cd6", &spec.name, "new"))
    }

    async fn create_domain(&self, spec: &DomainSpec, address: &str) -> Result<Resource> {
        self.enter("create_domain", address).await?;
        let domain = Resource::new(&spec.name, &spec.name, "active");
        match self.scripted_failure("create_domain_record") {
            Some(e) => Err(CloudError::incomplete(ResourceKind::Domain, domain, e)),
            None => Ok(domain),
        }
    }

    async fn create_certificate(&self, spec: &CertificateSpec) -> Result<Resource> {
        self.enter("create_certificate", &spec.name).await?;
        Ok(Resource::new("892071a0-bb95-49bc-8021-3afd67a210bf", &spec.name, "pending"))
    }

    async fn create_alert_policy(
        &self,
        spec: &MonitoringSpec,
        compute_id: &str,
    ) -> Result<Resource> {
        self.enter("create_alert_policy", compute_id).await?;
        Ok(Resource::new("78b3da62-27e5-49ba-ac70-5db0b5935c64", &spec.description, "enabled"))
    }

    async fn delete(&self, kind: ResourceKind, _resource: &Resource) -> Result<()> {
        self.enter("delete", kind.as_str()).await?;
        match self.delete_failures.lock().unwrap().get(&kind) {
            Some((status, message)) => Err(CloudError::provider(*status, message.clone())),
            None => Ok(()),
        }
    }
}

/// Probe with a fixed answer
pub struct MockProbe {
    open: bool,
    pub attempts: AtomicUsize,
}

impl MockProbe {
    pub fn open() -> Self {
        Self {
            open: true,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn closed() -> Self {
        Self {
            open: false,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn probe(&self, _address: &str, _port: u16) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.open
    }
}

/// Installer that records what it was asked to do
pub struct MockInstaller {
    pub contexts: Mutex<Vec<InstallContext>>,
    fail_step: Option<&'static str>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(Vec::new()),
            fail_step: None,
        }
    }

    pub fn failing(step: &'static str) -> Self {
        Self {
            contexts: Mutex::new(Vec::new()),
            fail_step: Some(step),
        }
    }
}

#[async_trait]
impl ApplicationInstaller for MockInstaller {
    async fn install(&self, ctx: &InstallContext) -> InstallReport {
        self.contexts.lock().unwrap().push(ctx.clone());
        let mut report = InstallReport::default();
        for step in ["package", "upload", "extract", "restart"] {
            if self.fail_step == Some(step) {
                report.failed(step, "exit status 255");
            } else {
                report.succeeded(step);
            }
        }
        report
    }
}

pub const LOCAL_NO_DOMAIN: &str = r#"{
    "projectName": "shop",
    "databaseType": "local",
    "credentials": {
        "databasePassword": "db-pw-1",
        "appSecret": "app-secret-1"
    },
    "features": { "enableSSL": false }
}"#;

/// Configuration with every feature on; the SSH key lives in `dir`
pub fn full_config(dir: &Path) -> String {
    let key_path = dir.join("id_ed25519.pub");
    std::fs::write(&key_path, "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIC6 ops@shop\n").unwrap();
    format!(
        r#"{{
    "projectName": "shop",
    "domain": "shop.example",
    "databaseType": "managed",
    "adminEmail": "ops@shop.example",
    "sshPublicKeyPath": "{}",
    "credentials": {{ "appSecret": "app-secret-1" }},
    "features": {{
        "enableSSL": true,
        "monitoring": true,
        "loadBalancer": true
    }}
}}"#,
        key_path.display()
    )
}

/// Local database with an SSH key and a domain, no SSL
pub fn keyed_config(dir: &Path) -> String {
    let key_path = dir.join("id_ed25519.pub");
    std::fs::write(&key_path, "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIC6 ops@shop\n").unwrap();
    format!(
        r#"{{
    "projectName": "shop",
    "domain": "shop.example",
    "databaseType": "local",
    "sshPublicKeyPath": "{}",
    "credentials": {{ "databasePassword": "db-pw-1", "appSecret": "app-secret-1" }}
}}"#,
        key_path.display()
    )
}

pub fn load(json: &str) -> (Configuration, Plan) {
    let config = parse_str(json, Format::Json).unwrap();
    let plan = InfrastructurePlanner::new().plan(&config).unwrap();
    (config, plan)
}
