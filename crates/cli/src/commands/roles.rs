//! Role catalog inspection.

use smc_connector::smc::IdentityMirror;
use smc_connector_core::SmcRole;

use super::{CliError, connect};

/// List the roles the SMC defines, flagging those the connector manages.
///
/// # Errors
///
/// Returns an error if the role listing cannot be read.
pub async fn list() -> Result<(), CliError> {
    let (_, client) = connect()?;
    let mut session = client.login().await?;
    let catalog = IdentityMirror::new(&session).list_roles().await;
    session.release().await;

    let catalog = catalog?;
    tracing::info!("{} role(s)", catalog.len());
    for (name, href) in catalog.iter() {
        let managed = SmcRole::ALL.iter().any(|r| r.name() == name);
        tracing::info!(
            "  {} {:<20} {}",
            if managed { "*" } else { " " },
            name,
            href
        );
    }
    Ok(())
}
