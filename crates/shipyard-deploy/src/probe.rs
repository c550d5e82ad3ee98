//! Instance reachability probing

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Checks whether an instance accepts inbound connections
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, address: &str, port: u16) -> bool;
}

/// Plain TCP connect with a timeout
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, address: &str, port: u16) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address, port, error = %e, "connection refused");
                false
            }
            Err(_) => {
                tracing::debug!(address, port, "connection attempt timed out");
                false
            }
        }
    }
}
