//! DigitalOcean provider for Shipyard
//!
//! Talks to the DigitalOcean API v2 over HTTPS with a personal access token
//! and implements [`shipyard_cloud::CloudApi`]. Droplet and database creation
//! return only once the resource is `active` / `online`.
//!
//! ```no_run
//! use shipyard_cloud::CloudApi;
//! use shipyard_cloud_digitalocean::CloudClient;
//!
//! # async fn run() -> shipyard_cloud::Result<()> {
//! let client = CloudClient::new(std::env::var("DIGITALOCEAN_TOKEN").unwrap_or_default())?;
//! let account = client.who_am_i().await?;
//! println!("authenticated as {}", account.email);
//! # Ok(())
//! # }
//! ```

mod api;
pub mod client;
mod provider;

pub use client::{CloudClient, DIGITALOCEAN_API_BASE};
