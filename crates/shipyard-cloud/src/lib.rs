//! Shipyard Cloud Infrastructure
//!
//! Provider-neutral building blocks for provisioning an application stack:
//! the resource model, the declarative [`Plan`], the [`CloudApi`] trait
//! providers implement, the persisted [`DeploymentState`] and the polling
//! [`ResourceWaiter`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  shipyard CLI                    │
//! │            (deploy / cleanup / plan)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               shipyard-deploy                    │
//! │     orchestrator · teardown · installer          │
//! └───────┬─────────────────────────┬───────────────┘
//!         │                         │
//! ┌───────▼─────────────────────────▼───────────────┐
//! │               shipyard-cloud                     │
//! │  ┌──────────────┐ ┌────────────┐ ┌───────────┐  │
//! │  │ trait        │ │ State Mgmt │ │  Waiter   │  │
//! │  │ CloudApi     │ │            │ │           │  │
//! │  └──────────────┘ └────────────┘ └───────────┘  │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼────────┐
//! │  digitalocean  │
//! │    provider    │
//! └────────────────┘
//! ```

pub mod error;
pub mod plan;
pub mod provider;
pub mod report;
pub mod resource;
pub mod state;
pub mod waiter;

// Re-exports
pub use error::{CloudError, Result};
pub use plan::{
    BackupSpec, CertificateSpec, ComputeSpec, DatabaseSpec, DnsRecordSpec, DomainSpec,
    FirewallRule, FirewallSpec, ForwardingRule, HealthCheck, KeySlot, LoadBalancerSpec,
    LocalDatabaseSpec, ManagedDatabaseSpec, MonitoringSpec, Plan, PlanSummary, Protocol,
    SshKeySpec,
};
pub use provider::{CloudApi, ProvisionedDatabase};
pub use report::{ResourceRef, TeardownError, TeardownReport, TeardownSummary};
pub use resource::{Account, DatabaseConnection, Resource, ResourceKind};
pub use state::{
    DeploymentState, PartialFailure, Phase, PhaseStatus, StateLock, StateManager,
};
pub use waiter::{Poll, Polled, ResourceWaiter, StatusTarget, WaitPolicy, poll_until};

/// Re-exported so callers share the cancellation type used by waiters
pub use tokio_util::sync::CancellationToken;
