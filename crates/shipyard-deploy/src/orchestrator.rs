//! Deployment orchestration
//!
//! Phases run strictly in order because later phases need identifiers
//! produced by earlier ones (the firewall needs the instance id, DNS records
//! need its address). Every created resource is recorded in the
//! [`DeploymentState`] and the state is written to disk before the next
//! provider call, so the state file never lists a resource that does not
//! exist. A creation that fails after the provider assigned an id (a wait
//! that times out or is cancelled, a DNS record that is rejected) still
//! records the resource, so teardown can remove it.
//!
//! | phase | on failure |
//! |---|---|
//! | prerequisites, ssh_key, compute, database, firewall | abort |
//! | load_balancer, domain, certificate, monitoring | record and continue |
//! | reachability | abort, unless the provider still reports the instance active |
//! | install | record and continue |

use crate::confirm::AssumeNo;
use crate::error::{DeployError, Result};
use crate::installer::{ApplicationInstaller, InstallContext, InstallReport};
use crate::probe::{ReachabilityProbe, TcpProbe};
use crate::teardown::TeardownTool;
use shipyard_cloud::{
    CancellationToken, CloudApi, CloudError, DatabaseConnection, DatabaseSpec, DeploymentState,
    LocalDatabaseSpec, PartialFailure, Phase, PhaseStatus, Plan, Poll, Resource, ResourceKind,
    StateManager, TeardownSummary, WaitPolicy, poll_until,
};
use shipyard_core::{ConfigError, Configuration};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

const SSH_PORT: u16 = 22;

/// Caller choices for one deployment run
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Tear down whatever was created when a fatal phase fails
    pub cleanup_on_error: bool,
    /// Application directory handed to the installer
    pub app_dir: Option<PathBuf>,
}

/// Result of a deployment in which every mandatory phase succeeded
#[derive(Debug)]
pub struct DeploymentOutcome {
    pub state: DeploymentState,
    pub soft_failures: Vec<PartialFailure>,
    /// Public address of the compute instance
    pub address: String,
    /// Application database, managed or on the instance. Held in memory only.
    pub database: DatabaseConnection,
    pub install: Option<InstallReport>,
}

impl DeploymentOutcome {
    pub fn is_clean(&self) -> bool {
        self.soft_failures.is_empty()
    }
}

/// A fatal error tagged with the phase it happened in
struct Fatal {
    phase: Phase,
    source: CloudError,
}

type Step<T> = std::result::Result<T, Fatal>;

trait AtPhase<T> {
    fn at(self, phase: Phase) -> Step<T>;
}

impl<T, E: Into<CloudError>> AtPhase<T> for std::result::Result<T, E> {
    fn at(self, phase: Phase) -> Step<T> {
        self.map_err(|e| Fatal {
            phase,
            source: e.into(),
        })
    }
}

/// The state of one run and where it is persisted
struct Run<'a> {
    state: DeploymentState,
    manager: &'a StateManager,
}

impl Run<'_> {
    async fn persist(&mut self, phase: Phase) -> Step<()> {
        self.manager.save(&self.state).await.at(phase)
    }

    /// Record first, persist second
    async fn record(&mut self, phase: Phase, kind: ResourceKind, resource: Resource) -> Step<()> {
        info!(kind = %kind, id = %resource.id, status = %resource.status, "Resource created");
        self.state.record(kind, resource).at(phase)?;
        self.persist(phase).await
    }

    /// Record whatever a failed creation left behind and return the failure
    /// itself
    async fn salvage(&mut self, phase: Phase, err: CloudError) -> Step<CloudError> {
        let (source, created) = err.take_created();
        if let Some((kind, resource)) = created {
            warn!(
                kind = %kind,
                id = %resource.id,
                status = %resource.status,
                "Creation failed after the provider created the resource"
            );
            self.record(phase, kind, resource).await?;
        }
        Ok(source)
    }

    /// A mandatory creation: keep what it left behind, then abort
    async fn created<T>(&mut self, phase: Phase, result: shipyard_cloud::Result<T>) -> Step<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(Fatal {
                phase,
                source: self.salvage(phase, e).await?,
            }),
        }
    }

    async fn finish(&mut self, phase: Phase, status: PhaseStatus) -> Step<()> {
        tracing::debug!(phase = %phase, status = %status, "Phase finished");
        self.state.set_phase(phase, status);
        self.persist(phase).await
    }

    async fn soft_fail(&mut self, phase: Phase, message: String) -> Step<()> {
        warn!(phase = %phase, error = %message, "Phase failed, continuing");
        self.state.record_soft_failure(phase, message);
        self.finish(phase, PhaseStatus::Failed).await
    }
}

/// One observation of the reachability loop
enum Observation {
    Open,
    Closed(String),
}

/// Drives a [`Plan`] through the provider
pub struct DeploymentOrchestrator {
    cloud: Arc<dyn CloudApi>,
    state_manager: StateManager,
    probe: Arc<dyn ReachabilityProbe>,
    installer: Option<Arc<dyn ApplicationInstaller>>,
    reachability: WaitPolicy,
    cancel: CancellationToken,
}

impl DeploymentOrchestrator {
    pub fn new(cloud: Arc<dyn CloudApi>, state_manager: StateManager) -> Self {
        Self {
            cloud,
            state_manager,
            probe: Arc::new(TcpProbe::default()),
            installer: None,
            reachability: WaitPolicy::reachability(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn ApplicationInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn with_reachability_policy(mut self, policy: WaitPolicy) -> Self {
        self.reachability = policy;
        self
    }

    /// Token that aborts the run at the next phase boundary or poll
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    /// Run every phase of `plan`.
    ///
    /// On a fatal error the failed phase is persisted before the error is
    /// returned; the state file then lists exactly what was created.
    #[instrument(skip_all, fields(project = %plan.project))]
    pub async fn deploy(
        &self,
        config: &Configuration,
        plan: &Plan,
        options: &DeployOptions,
    ) -> Result<DeploymentOutcome> {
        let lock = self.state_manager.acquire_lock("deploy").await?;

        if let Some(existing) = self.state_manager.load().await?
            && !existing.is_empty()
        {
            return Err(DeployError::ExistingDeployment(
                self.state_manager.state_path(),
            ));
        }

        let mut run = Run {
            state: DeploymentState::new(&plan.project),
            manager: &self.state_manager,
        };
        self.state_manager.save(&run.state).await?;
        info!(kinds = plan.resource_kinds().len(), "Deployment started");

        match self.run_phases(&mut run, config, plan, options).await {
            Ok(outcome) => {
                lock.release().await?;
                info!(
                    address = %outcome.address,
                    soft_failures = outcome.soft_failures.len(),
                    "Deployment completed"
                );
                Ok(outcome)
            }
            Err(Fatal { phase, source }) => {
                error!(phase = %phase, error = %source, "Deployment aborted");
                run.state.set_phase(phase, PhaseStatus::Failed);
                if let Err(e) = self.state_manager.save(&run.state).await {
                    error!(error = %e, "Failed to persist state after abort");
                }
                if let Err(e) = lock.release().await {
                    warn!(error = %e, "Failed to release state lock");
                }

                let cleanup = if options.cleanup_on_error {
                    self.cleanup_after_failure().await
                } else {
                    None
                };

                Err(DeployError::PhaseFailed {
                    phase,
                    source,
                    state_path: self.state_manager.state_path(),
                    cleanup,
                })
            }
        }
    }

    async fn run_phases(
        &self,
        run: &mut Run<'_>,
        config: &Configuration,
        plan: &Plan,
        options: &DeployOptions,
    ) -> Step<DeploymentOutcome> {
        let public_key = self
            .check_prerequisites(plan, options)
            .await
            .at(Phase::Prerequisites)?;
        run.finish(Phase::Prerequisites, PhaseStatus::Completed).await?;

        // SSH key, then patch the compute spec with its id
        self.check_cancelled(Phase::SshKey)?;
        let compute_spec = match (&plan.ssh_key, public_key) {
            (Some(spec), Some(public_key)) => {
                let uploaded = self.cloud.upload_key(spec, &public_key).await;
                let key = run.created(Phase::SshKey, uploaded).await?;
                let compute_spec = plan.compute.with_ssh_key(&key.id);
                run.record(Phase::SshKey, ResourceKind::SshKey, key).await?;
                run.finish(Phase::SshKey, PhaseStatus::Completed).await?;
                compute_spec
            }
            _ => {
                run.finish(Phase::SshKey, PhaseStatus::Skipped).await?;
                plan.compute.clone()
            }
        };

        // Compute, returned once active
        self.check_cancelled(Phase::Compute)?;
        let requested = self
            .cloud
            .create_compute(&compute_spec, &plan.bootstrap_script, &self.cancel)
            .await;
        let compute = run.created(Phase::Compute, requested).await?;
        let compute_id = compute.id.clone();
        let address = compute.attribute_str("public_ipv4").map(str::to_string);
        run.record(Phase::Compute, ResourceKind::Compute, compute).await?;
        let address = address
            .ok_or_else(|| {
                CloudError::UnexpectedResponse(format!(
                    "compute {} has no public IPv4 address",
                    compute_id
                ))
            })
            .at(Phase::Compute)?;
        run.finish(Phase::Compute, PhaseStatus::Completed).await?;

        self.check_cancelled(Phase::Database)?;
        let database = match &plan.database {
            DatabaseSpec::Managed(spec) => {
                let requested = self.cloud.create_database_cluster(spec, &self.cancel).await;
                let provisioned = run.created(Phase::Database, requested).await?;
                run.record(Phase::Database, ResourceKind::Database, provisioned.resource)
                    .await?;
                provisioned.connection
            }
            DatabaseSpec::Local(spec) => local_connection(spec, config).at(Phase::Database)?,
        };
        run.finish(Phase::Database, PhaseStatus::Completed).await?;

        self.check_cancelled(Phase::Firewall)?;
        match &plan.firewall {
            Some(spec) => {
                let requested = self.cloud.create_firewall(spec, &compute_id).await;
                let firewall = run.created(Phase::Firewall, requested).await?;
                run.record(Phase::Firewall, ResourceKind::Firewall, firewall)
                    .await?;
                run.finish(Phase::Firewall, PhaseStatus::Completed).await?;
            }
            None => run.finish(Phase::Firewall, PhaseStatus::Skipped).await?,
        }

        self.soft_phase(
            run,
            Phase::LoadBalancer,
            ResourceKind::LoadBalancer,
            plan.load_balancer
                .as_ref()
                .map(|spec| self.cloud.create_load_balancer(spec, &compute_id)),
        )
        .await?;

        self.soft_phase(
            run,
            Phase::Domain,
            ResourceKind::Domain,
            plan.domain
                .as_ref()
                .map(|spec| self.cloud.create_domain(spec, &address)),
        )
        .await?;

        self.soft_phase(
            run,
            Phase::Certificate,
            ResourceKind::Certificate,
            plan.certificate
                .as_ref()
                .map(|spec| self.cloud.create_certificate(spec)),
        )
        .await?;

        self.soft_phase(
            run,
            Phase::Monitoring,
            ResourceKind::Monitoring,
            plan.monitoring
                .as_ref()
                .map(|spec| self.cloud.create_alert_policy(spec, &compute_id)),
        )
        .await?;

        self.check_cancelled(Phase::Reachability)?;
        match self.wait_until_reachable(&compute_id, &address).await {
            Ok(polls) => {
                info!(address = %address, polls, "Instance is reachable");
                run.finish(Phase::Reachability, PhaseStatus::Completed)
                    .await?;
            }
            Err(e) if self.still_reported_ready(&e) => {
                run.soft_fail(
                    Phase::Reachability,
                    format!(
                        "{} is active but refused connections on port {}: {}",
                        address, SSH_PORT, e
                    ),
                )
                .await?;
            }
            Err(source) => {
                return Err(Fatal {
                    phase: Phase::Reachability,
                    source,
                });
            }
        }

        let install = match (&self.installer, &options.app_dir) {
            (Some(installer), Some(app_dir)) => {
                self.check_cancelled(Phase::Install)?;
                let mut environment = BTreeMap::new();
                if plan.database.is_managed() {
                    environment.insert("DATABASE_URL".to_string(), database.url());
                }
                let ctx = InstallContext {
                    project: plan.project.clone(),
                    address: address.clone(),
                    app_dir: app_dir.clone(),
                    environment,
                };

                let report = installer.install(&ctx).await;
                if report.is_success() {
                    run.finish(Phase::Install, PhaseStatus::Completed).await?;
                } else {
                    let failed: Vec<&str> = report.failures().map(|s| s.name.as_str()).collect();
                    run.soft_fail(
                        Phase::Install,
                        format!("install steps failed: {}", failed.join(", ")),
                    )
                    .await?;
                }
                Some(report)
            }
            _ => {
                run.finish(Phase::Install, PhaseStatus::Skipped).await?;
                None
            }
        };

        Ok(DeploymentOutcome {
            soft_failures: run.state.soft_failures.clone(),
            state: run.state.clone(),
            address,
            database,
            install,
        })
    }

    /// Local artifacts first, then the token. Nothing is created here.
    async fn check_prerequisites(
        &self,
        plan: &Plan,
        options: &DeployOptions,
    ) -> shipyard_cloud::Result<Option<String>> {
        if let Some(app_dir) = &options.app_dir
            && !app_dir.is_dir()
        {
            return Err(CloudError::Config(format!(
                "application directory {} does not exist",
                app_dir.display()
            )));
        }

        let public_key = match &plan.ssh_key {
            Some(spec) => {
                let key = tokio::fs::read_to_string(&spec.public_key_path)
                    .await
                    .map_err(|e| ConfigError::SshKey {
                        path: spec.public_key_path.clone(),
                        message: e.to_string(),
                    })?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(ConfigError::SshKey {
                        path: spec.public_key_path.clone(),
                        message: "file is empty".to_string(),
                    }
                    .into());
                }
                Some(key.to_string())
            }
            None => None,
        };

        let account = self.cloud.who_am_i().await?;
        info!(
            provider = self.cloud.name(),
            account = %account.email,
            "API token validated"
        );
        Ok(public_key)
    }

    async fn soft_phase<F>(
        &self,
        run: &mut Run<'_>,
        phase: Phase,
        kind: ResourceKind,
        create: Option<F>,
    ) -> Step<()>
    where
        F: Future<Output = shipyard_cloud::Result<Resource>>,
    {
        self.check_cancelled(phase)?;
        let Some(create) = create else {
            return run.finish(phase, PhaseStatus::Skipped).await;
        };

        match create.await {
            Ok(resource) => {
                run.record(phase, kind, resource).await?;
                run.finish(phase, PhaseStatus::Completed).await
            }
            Err(e) => {
                let source = run.salvage(phase, e).await?;
                run.soft_fail(phase, source.to_string()).await
            }
        }
    }

    /// Alternate a connection probe and a provider status check until the
    /// instance accepts connections. Returns the number of rounds it took.
    async fn wait_until_reachable(
        &self,
        compute_id: &str,
        address: &str,
    ) -> shipyard_cloud::Result<u32> {
        let target = self.cloud.readiness(ResourceKind::Compute);
        let probe = self.probe.as_ref();
        let cloud = self.cloud.as_ref();
        let what = format!("{} port {}", address, SSH_PORT);

        let polled = poll_until(
            &what,
            &self.reachability,
            &self.cancel,
            || async move {
                if probe.probe(address, SSH_PORT).await {
                    return Ok(Observation::Open);
                }
                cloud
                    .get_compute(compute_id)
                    .await
                    .map(|r| Observation::Closed(r.status))
            },
            |observed| match observed {
                Observation::Open => Poll::Ready,
                Observation::Closed(status) => match target {
                    Some(t) if t.failures.contains(&status.as_str()) => {
                        Poll::Failed(status.clone())
                    }
                    _ => Poll::Pending(status.clone()),
                },
            },
        )
        .await?;
        Ok(polled.polls)
    }

    /// Whether a reachability timeout ended with the provider reporting the
    /// instance ready
    fn still_reported_ready(&self, err: &CloudError) -> bool {
        let Some(target) = self.cloud.readiness(ResourceKind::Compute) else {
            return false;
        };
        matches!(err, CloudError::Timeout { last_observed, .. } if last_observed == target.ready)
    }

    fn check_cancelled(&self, next: Phase) -> Step<()> {
        if self.cancel.is_cancelled() {
            return Err(Fatal {
                phase: next,
                source: CloudError::Cancelled,
            });
        }
        Ok(())
    }

    async fn cleanup_after_failure(&self) -> Option<TeardownSummary> {
        warn!("Removing resources created by the failed deployment");
        let teardown = TeardownTool::new(self.cloud.clone(), self.state_manager.clone());
        match teardown.run(&AssumeNo).await {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(
                        kind = %failure.kind,
                        id = %failure.id,
                        error = %failure.message,
                        "Cleanup left a resource behind"
                    );
                }
                Some(report.summary())
            }
            Err(e) => {
                error!(error = %e, "Automatic cleanup failed");
                None
            }
        }
    }
}

/// Connection descriptor for the database the bootstrap script installs
fn local_connection(
    spec: &LocalDatabaseSpec,
    config: &Configuration,
) -> std::result::Result<DatabaseConnection, ConfigError> {
    let password = config
        .credentials
        .database_password
        .clone()
        .ok_or_else(|| {
            ConfigError::Invalid("credentials.databasePassword is required for a local database".into())
        })?;
    Ok(DatabaseConnection {
        host: "localhost".to_string(),
        port: spec.port,
        database: spec.database.clone(),
        user: spec.user.clone(),
        password,
        require_tls: false,
    })
}
