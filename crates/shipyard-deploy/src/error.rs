use shipyard_cloud::{CloudError, Phase, TeardownSummary};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    /// A fatal phase failed. The state file reflects what was created.
    #[error(
        "Deployment failed in phase '{phase}': {source}\n{}",
        recovery_hint(state_path, cleanup.as_ref())
    )]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: CloudError,
        state_path: PathBuf,
        /// Outcome of the automatic cleanup, when it was requested
        cleanup: Option<TeardownSummary>,
    },

    #[error(
        "A previous deployment is recorded in {}\nRun `shipyard cleanup` before deploying again",
        .0.display()
    )]
    ExistingDeployment(PathBuf),

    #[error("No deployment state found at {}", .0.display())]
    NoState(PathBuf),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl DeployError {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            DeployError::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

fn recovery_hint(state_path: &Path, cleanup: Option<&TeardownSummary>) -> String {
    match cleanup {
        Some(summary) => format!(
            "Automatic cleanup: {}. Remaining resources are listed in {}",
            summary,
            state_path.display()
        ),
        None => format!(
            "State saved to {}\nRun `shipyard cleanup` to remove the created resources",
            state_path.display()
        ),
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
