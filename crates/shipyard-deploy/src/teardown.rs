//! Teardown of a recorded deployment
//!
//! Works from the state file only. Deletions run in reverse creation order
//! and are independent of each other: a failed deletion is collected into
//! the report and the pass moves on to the next resource.

use crate::confirm::Confirm;
use crate::error::{DeployError, Result};
use shipyard_cloud::{
    CloudApi, DeploymentState, Resource, ResourceKind, StateManager, TeardownReport,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub struct TeardownTool {
    cloud: Arc<dyn CloudApi>,
    state_manager: StateManager,
}

impl TeardownTool {
    pub fn new(cloud: Arc<dyn CloudApi>, state_manager: StateManager) -> Self {
        Self {
            cloud,
            state_manager,
        }
    }

    /// Load the persisted state so it can be shown before anything is deleted
    pub async fn preview(&self) -> Result<DeploymentState> {
        self.state_manager
            .load()
            .await?
            .ok_or_else(|| DeployError::NoState(self.state_manager.state_path()))
    }

    /// Delete every recorded resource.
    ///
    /// The domain and the SSH key are only deleted when `confirm` agrees.
    /// Each successful deletion is removed from the state file right away.
    #[instrument(skip_all)]
    pub async fn run(&self, confirm: &dyn Confirm) -> Result<TeardownReport> {
        let started = Instant::now();
        let lock = self.state_manager.acquire_lock("cleanup").await?;

        let mut state = self.preview().await?;
        let candidates: Vec<(ResourceKind, Resource)> = state
            .teardown_candidates()
            .into_iter()
            .map(|(kind, resource)| (kind, resource.clone()))
            .collect();
        info!(project = %state.project, resources = candidates.len(), "Teardown started");

        let mut report = TeardownReport::new();
        for (kind, resource) in candidates {
            if kind.is_optional_deletion() {
                let prompt = format!(
                    "Delete {} '{}' ({})? It may be shared with other deployments.",
                    kind.display_name(),
                    resource.name,
                    resource.id
                );
                if !confirm.confirm(&prompt) {
                    info!(kind = %kind, id = %resource.id, "Keeping resource");
                    report.add_kept(kind, &resource.id, &resource.name);
                    continue;
                }
            }

            match self.cloud.delete(kind, &resource).await {
                Ok(()) => {
                    info!(kind = %kind, id = %resource.id, "Resource deleted");
                    state.forget(kind);
                    report.add_deleted(kind, &resource.id, &resource.name);
                    if let Err(e) = self.state_manager.save(&state).await {
                        warn!(error = %e, "Failed to persist state after deletion");
                    }
                }
                Err(e) => {
                    warn!(kind = %kind, id = %resource.id, error = %e, "Deletion failed");
                    report.add_failure(kind, &resource.id, e.to_string());
                }
            }
        }

        self.state_manager.save(&state).await?;
        lock.release().await?;

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(summary = %report.summary(), "Teardown finished");
        Ok(report)
    }
}
