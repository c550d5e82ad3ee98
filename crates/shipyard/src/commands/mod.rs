pub mod cleanup;
pub mod deploy;
pub mod plan;
pub mod status;

use shipyard_cloud_digitalocean::CloudClient;
use std::sync::Arc;

/// Provider client for a resolved token
fn cloud_client(from_config: Option<&str>) -> anyhow::Result<Arc<CloudClient>> {
    let token = shipyard_config::resolve_api_token(from_config)?;
    Ok(Arc::new(CloudClient::new(token)?))
}
