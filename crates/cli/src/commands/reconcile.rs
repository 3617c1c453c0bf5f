//! One-shot reconciliation.
//!
//! # Environment Variables
//!
//! Same as the connector service; the Azure CLI is signed in with
//! `AZURE_ADMIN_LOGIN_NAME` / `AZURE_ADMIN_LOGIN_PASSWORD` first.

use smc_connector::directory::AzureCliDirectory;
use smc_connector::reconcile::Reconciler;

use super::{CliError, connect};

/// Run a single reconciliation cycle and report what it changed.
///
/// # Errors
///
/// Returns an error if configuration, directory sign-in or the role pass
/// fails. Per-user failures are reported but do not fail the command.
pub async fn once() -> Result<(), CliError> {
    let (config, client) = connect()?;

    let directory = AzureCliDirectory::new(config.directory.az_cli_path.clone());
    directory
        .login(
            &config.directory.admin_login_name,
            &config.directory.admin_password,
        )
        .await?;

    tracing::info!("Running reconciliation cycle against {}", client.base_url());
    let report = Reconciler::new(client, directory, config.reconcile_settings())
        .run_cycle()
        .await;

    tracing::info!("Updated:        {}", report.updated.join(", "));
    tracing::info!("Unchanged:      {}", report.unchanged.join(", "));
    tracing::info!("Failed:         {}", report.failed.join(", "));
    tracing::info!("Deprovisioned:  {}", report.deprovisioned.join(", "));
    if let Some(reason) = &report.deprovision_aborted {
        tracing::warn!("Deprovisioning skipped: {reason}");
    }

    match report.aborted {
        Some(reason) => Err(CliError::Aborted(reason)),
        None => {
            tracing::info!("Cycle complete: {} write(s)", report.writes());
            Ok(())
        }
    }
}
