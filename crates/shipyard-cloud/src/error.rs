//! Cloud provider error types

use crate::resource::{Resource, ResourceKind};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to a provider or managing deployment state
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The provider rejected a call. Status and message are kept verbatim.
    #[error("Provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Timed out after {}s waiting for {what} (last observed: {last_observed})", elapsed.as_secs())]
    Timeout {
        what: String,
        elapsed: Duration,
        last_observed: String,
    },

    #[error("{what} entered terminal status '{status}'")]
    ResourceFailed { what: String, status: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// The provider created the resource, then a later step of the same
    /// call failed. The resource exists and has to be recorded.
    #[error("{kind} {} was created but not completed: {cause}", resource.id)]
    Incomplete {
        kind: ResourceKind,
        resource: Box<Resource>,
        cause: Box<CloudError>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    UnexpectedResponse(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// HTTP status reported by the provider, if any
    /// Wrap a failure that happened after `resource` was created. A terminal
    /// status reported by the provider replaces the creation-time one.
    pub fn incomplete(kind: ResourceKind, mut resource: Resource, source: CloudError) -> Self {
        if let CloudError::ResourceFailed { status, .. } = &source {
            resource.status = status.clone();
        }
        Self::Incomplete {
            kind,
            resource: Box::new(resource),
            cause: Box::new(source),
        }
    }

    /// Separate the resource an incomplete creation left behind from the
    /// failure itself
    pub fn take_created(self) -> (CloudError, Option<(ResourceKind, Resource)>) {
        match self {
            Self::Incomplete {
                kind,
                resource,
                cause,
            } => (*cause, Some((kind, *resource))),
            other => (other, None),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Network blips, rate limiting and provider-side 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
