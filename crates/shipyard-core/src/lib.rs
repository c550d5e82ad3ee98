//! Shipyard Core
//!
//! The user [`Configuration`], its loading and validation, and the
//! [`InfrastructurePlanner`] that turns it into a provider-neutral
//! [`shipyard_cloud::Plan`] together with the instance bootstrap script.

pub mod bootstrap;
pub mod error;
pub mod loader;
pub mod model;
pub mod planner;

pub use bootstrap::{local_database_url, render_bootstrap};
pub use error::{ConfigError, Result};
pub use loader::{Format, load_configuration, parse_str, validate};
pub use model::{Configuration, Credentials, DatabaseMode, Features};
pub use planner::InfrastructurePlanner;
