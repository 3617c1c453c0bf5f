//! Command implementations.

pub mod admins;
pub mod reconcile;
pub mod roles;

use smc_connector::config::{ConfigError, ConnectorConfig};
use smc_connector::directory::DirectoryError;
use smc_connector::smc::{SmcClient, SmcError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("SMC error: {0}")]
    Smc(#[from] SmcError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Failed to render output: {0}")]
    Json(#[from] serde_json::Error),

    /// The cycle could not complete its role pass.
    #[error("Reconciliation aborted: {0}")]
    Aborted(String),
}

/// Load configuration and build an SMC client from it.
fn connect() -> Result<(ConnectorConfig, SmcClient), CliError> {
    let config = ConnectorConfig::from_env()?;
    let client = SmcClient::new(config.smc.endpoint())?;
    Ok((config, client))
}
