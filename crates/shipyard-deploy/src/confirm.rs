//! Confirmation capability
//!
//! Deleting reusable resources (the domain, the SSH key) needs operator
//! consent. The decision is requested from a caller-supplied [`Confirm`]
//! so that teardown logic never reads from a terminal itself.

pub trait Confirm: Send + Sync {
    /// Return true to proceed with the described action
    fn confirm(&self, prompt: &str) -> bool;
}

/// Approves every request (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, "auto-confirmed");
        true
    }
}

/// Declines every request; used for unattended cleanup after a failed deploy
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, "auto-declined");
        false
    }
}
