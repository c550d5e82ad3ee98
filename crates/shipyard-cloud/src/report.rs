//! Result types for teardown passes

use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};

/// A resource touched by a teardown pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

/// A deletion that failed. Collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownError {
    pub kind: ResourceKind,
    pub id: String,
    pub message: String,
}

impl std::fmt::Display for TeardownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.id, self.message)
    }
}

/// Result of a teardown pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeardownReport {
    /// Deleted resources, in the order they were deleted
    pub deleted: Vec<ResourceRef>,

    /// Resources the operator chose to keep
    pub kept: Vec<ResourceRef>,

    /// Failed deletions
    pub failures: Vec<TeardownError>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl TeardownReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn add_deleted(
        &mut self,
        kind: ResourceKind,
        id: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.deleted.push(ResourceRef {
            kind,
            id: id.into(),
            name: name.into(),
        });
    }

    pub fn add_kept(&mut self, kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) {
        self.kept.push(ResourceRef {
            kind,
            id: id.into(),
            name: name.into(),
        });
    }

    pub fn add_failure(
        &mut self,
        kind: ResourceKind,
        id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.failures.push(TeardownError {
            kind,
            id: id.into(),
            message: message.into(),
        });
    }

    pub fn summary(&self) -> TeardownSummary {
        TeardownSummary {
            deleted: self.deleted.len(),
            kept: self.kept.len(),
            failed: self.failures.len(),
        }
    }
}

/// Counts of a teardown pass
#[derive(Debug, Clone, Copy)]
pub struct TeardownSummary {
    pub deleted: usize,
    pub kept: usize,
    pub failed: usize,
}

impl std::fmt::Display for TeardownSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} deleted, {} kept, {} failed",
            self.deleted, self.kept, self.failed
        )
    }
}
