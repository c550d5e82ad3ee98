//! Shipyard Deploy
//!
//! Runs a [`shipyard_cloud::Plan`] against a provider and removes what a
//! deployment left behind.
//!
//! - [`DeploymentOrchestrator`]: phase-ordered provisioning with the state
//!   file written after every change
//! - [`TeardownTool`]: reverse-order deletion driven by the state file
//! - [`ApplicationInstaller`]: ships the application once the instance is
//!   reachable
//! - [`Confirm`] and [`ReachabilityProbe`]: capabilities supplied by the caller

pub mod confirm;
pub mod error;
pub mod installer;
pub mod orchestrator;
pub mod probe;
pub mod teardown;

pub use confirm::{AssumeNo, AssumeYes, Confirm};
pub use error::{DeployError, Result};
pub use installer::{ApplicationInstaller, InstallContext, InstallReport, InstallStep, SshInstaller};
pub use orchestrator::{DeployOptions, DeploymentOrchestrator, DeploymentOutcome};
pub use probe::{ReachabilityProbe, TcpProbe};
pub use teardown::TeardownTool;
