//! Polling waiter for asynchronously activated resources
//!
//! Each watched resource runs a small state machine:
//!
//! ```text
//! polling ──▶ ready      (target status observed)
//!    │
//!    ├──────▶ failed     (terminal failure status observed, no retry)
//!    └──────▶ timed out  (deadline exceeded)
//! ```
//!
//! Fetch errors are not terminal: they are logged and polling continues until
//! the deadline, so a network blip does not abort a ten minute wait.

use crate::error::{CloudError, Result};
use crate::resource::{Resource, ResourceKind};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interval and hard deadline for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl WaitPolicy {
    pub const fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Compute instances: 10s interval, 10 minutes
    pub const fn compute() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(600))
    }

    /// Managed databases take considerably longer: 10s interval, 30 minutes
    pub const fn database() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(1800))
    }

    /// Instance reachable after boot: 30s interval, 5 minutes
    pub const fn reachability() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(300))
    }
}

/// Classification of one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Ready,
    Failed(String),
    Pending(String),
}

/// Value that satisfied the predicate and the number of fetches it took
#[derive(Debug, Clone)]
pub struct Polled<T> {
    pub value: T,
    pub polls: u32,
}

/// Poll `fetch` until `classify` reports ready or failed, or the deadline passes.
pub async fn poll_until<T, F, Fut, C>(
    what: &str,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
    mut fetch: F,
    classify: C,
) -> Result<Polled<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&T) -> Poll,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }

        polls += 1;
        let last_observed = match fetch().await {
            Ok(value) => match classify(&value) {
                Poll::Ready => {
                    tracing::debug!(what, polls, "ready");
                    return Ok(Polled { value, polls });
                }
                Poll::Failed(status) => {
                    return Err(CloudError::ResourceFailed {
                        what: what.to_string(),
                        status,
                    });
                }
                Poll::Pending(status) => {
                    tracing::debug!(what, polls, status = %status, "still waiting");
                    status
                }
            },
            Err(e) => {
                tracing::warn!(what, polls, error = %e, "poll failed, retrying");
                format!("error: {}", e)
            }
        };

        let elapsed = started.elapsed();
        if elapsed >= policy.deadline {
            return Err(CloudError::Timeout {
                what: what.to_string(),
                elapsed,
                last_observed,
            });
        }

        let pause = policy.interval.min(policy.deadline - elapsed);
        tokio::select! {
            _ = cancel.cancelled() => return Err(CloudError::Cancelled),
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// Ready status and terminal failure statuses of a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTarget {
    pub ready: &'static str,
    pub failures: &'static [&'static str],
}

impl StatusTarget {
    pub fn classify(&self, status: &str) -> Poll {
        if status == self.ready {
            Poll::Ready
        } else if self.failures.contains(&status) {
            Poll::Failed(status.to_string())
        } else {
            Poll::Pending(status.to_string())
        }
    }
}

/// Waits for a [`Resource`] to reach its target status
#[derive(Debug, Clone, Copy)]
pub struct ResourceWaiter {
    policy: WaitPolicy,
}

impl ResourceWaiter {
    pub fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    pub async fn wait_for_status<F, Fut>(
        &self,
        kind: ResourceKind,
        id: &str,
        target: StatusTarget,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<Polled<Resource>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Resource>>,
    {
        let what = format!("{} {}", kind, id);
        tracing::info!(
            kind = %kind,
            id,
            target = target.ready,
            deadline_secs = self.policy.deadline.as_secs(),
            "waiting for resource"
        );
        poll_until(&what, &self.policy, cancel, fetch, |r: &Resource| {
            target.classify(&r.status)
        })
        .await
    }
}
