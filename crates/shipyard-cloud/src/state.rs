//! Deployment state management
//!
//! Manages the `.shipyard/state.json` file which records every resource a
//! deployment created. The file is rewritten after each change so that an
//! interrupted run can always be inspected or cleaned up.

use crate::error::{CloudError, Result};
use crate::resource::{Resource, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".shipyard";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Deployment phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prerequisites,
    SshKey,
    Compute,
    Database,
    Firewall,
    LoadBalancer,
    Domain,
    Certificate,
    Monitoring,
    Reachability,
    Install,
}

impl Phase {
    pub const ALL: [Phase; 11] = [
        Phase::Prerequisites,
        Phase::SshKey,
        Phase::Compute,
        Phase::Database,
        Phase::Firewall,
        Phase::LoadBalancer,
        Phase::Domain,
        Phase::Certificate,
        Phase::Monitoring,
        Phase::Reachability,
        Phase::Install,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prerequisites => "prerequisites",
            Phase::SshKey => "ssh_key",
            Phase::Compute => "compute",
            Phase::Database => "database",
            Phase::Firewall => "firewall",
            Phase::LoadBalancer => "load_balancer",
            Phase::Domain => "domain",
            Phase::Certificate => "certificate",
            Phase::Monitoring => "monitoring",
            Phase::Reachability => "reachability",
            Phase::Install => "install",
        }
    }

    /// Whether a failure in this phase aborts the run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Phase::Prerequisites
                | Phase::SshKey
                | Phase::Compute
                | Phase::Database
                | Phase::Firewall
                | Phase::Reachability
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "pending"),
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Failed => write!(f, "failed"),
            PhaseStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A soft-fail phase that did not succeed while the run continued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub phase: Phase,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Everything a deployment has created so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// State file version
    pub version: u32,

    pub project: String,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources that exist, by kind
    pub resources: BTreeMap<ResourceKind, Resource>,

    /// Progress of each phase
    pub steps: BTreeMap<Phase, PhaseStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soft_failures: Vec<PartialFailure>,
}

impl DeploymentState {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            project: project.into(),
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            steps: Phase::ALL.iter().map(|p| (*p, PhaseStatus::Pending)).collect(),
            soft_failures: Vec::new(),
        }
    }

    /// Record a newly created resource.
    ///
    /// Recording the same id again refreshes it; a different id for an
    /// already recorded kind is refused so that nothing is silently dropped.
    pub fn record(&mut self, kind: ResourceKind, resource: Resource) -> Result<()> {
        if let Some(existing) = self.resources.get(&kind)
            && existing.id != resource.id
        {
            return Err(CloudError::State(format!(
                "{} {} is already recorded, refusing to replace it with {}",
                kind, existing.id, resource.id
            )));
        }
        self.resources.insert(kind, resource);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Update the status of a recorded resource after a re-fetch
    pub fn refresh_status(&mut self, kind: ResourceKind, status: impl Into<String>) {
        if let Some(resource) = self.resources.get_mut(&kind) {
            resource.status = status.into();
            self.updated_at = Utc::now();
        }
    }

    /// Drop a resource from the state once it has been deleted. Only teardown calls this.
    pub fn forget(&mut self, kind: ResourceKind) -> Option<Resource> {
        let removed = self.resources.remove(&kind);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.get(&kind)
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.resources.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn set_phase(&mut self, phase: Phase, status: PhaseStatus) {
        self.steps.insert(phase, status);
        self.updated_at = Utc::now();
    }

    pub fn phase(&self, phase: Phase) -> PhaseStatus {
        self.steps.get(&phase).copied().unwrap_or(PhaseStatus::Pending)
    }

    pub fn record_soft_failure(&mut self, phase: Phase, message: impl Into<String>) {
        self.soft_failures.push(PartialFailure {
            phase,
            message: message.into(),
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// First phase marked failed, if any
    pub fn failed_phase(&self) -> Option<Phase> {
        Phase::ALL
            .iter()
            .copied()
            .find(|p| self.phase(*p) == PhaseStatus::Failed && p.is_fatal())
    }

    /// Recorded resources in teardown order
    pub fn teardown_candidates(&self) -> Vec<(ResourceKind, &Resource)> {
        ResourceKind::teardown_order()
            .iter()
            .filter_map(|kind| self.resources.get(kind).map(|r| (*kind, r)))
            .collect()
    }
}

/// State manager for reading/writing the state file
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Get the state directory path
    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn tmp_path(&self) -> PathBuf {
        self.state_dir().join(STATE_TMP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the persisted state, `None` when no deployment has been recorded
    pub async fn load(&self) -> Result<Option<DeploymentState>> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let state: DeploymentState = serde_json::from_str(&content).map_err(|e| {
            CloudError::State(format!("{} is not a valid state file: {}", path.display(), e))
        })?;

        if state.version > STATE_VERSION {
            return Err(CloudError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(Some(state))
    }

    /// Save the state.
    ///
    /// The previous file is kept as `state.json.backup` and the new content
    /// is written to a temporary file first, so a crash mid-write never
    /// leaves a truncated state file behind.
    pub async fn save(&self, state: &DeploymentState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let tmp = self.tmp_path();

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self, command: &str) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            match serde_json::from_str::<LockInfo>(&content) {
                Ok(lock_info) => {
                    // Locks older than an hour are considered stale
                    let age = Utc::now().signed_duration_since(lock_info.acquired_at);
                    if age.num_hours() < 1 {
                        return Err(CloudError::Lock(format!(
                            "State is locked by `{}` on {} (pid {}) since {}",
                            lock_info.command,
                            lock_info.holder,
                            lock_info.pid,
                            lock_info.acquired_at
                        )));
                    }
                    tracing::warn!("Removing stale lock from {}", lock_info.holder);
                }
                Err(e) => tracing::warn!("Replacing unreadable lock file: {}", e),
            }
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            command: command.to_string(),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    command: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
#[derive(Debug)]
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
