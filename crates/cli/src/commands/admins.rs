//! Administrator inspection commands.

use smc_connector::smc::{IdentityMirror, SmcError, SmcSession};

use super::{CliError, connect};

/// List every administrator.
///
/// # Errors
///
/// Returns an error if the SMC cannot be read.
pub async fn list() -> Result<(), CliError> {
    let (_, client) = connect()?;
    let mut session = client.login().await?;
    let result = list_in(&session).await;
    session.release().await;
    result.map_err(Into::into)
}

async fn list_in(session: &SmcSession) -> Result<(), SmcError> {
    let mirror = IdentityMirror::new(session);
    let summaries = mirror.list_administrators().await?;
    tracing::info!("{} administrator(s)", summaries.len());

    for summary in summaries {
        let admin = mirror.administrator(&summary.href).await?;
        tracing::info!(
            "  {:<24} enabled={:<5} superuser={:<5} id={}",
            admin.name(),
            admin.record.enabled,
            admin.record.superuser,
            admin.ldap_user_id().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Show one administrator document.
///
/// # Errors
///
/// Returns an error if `name_or_id` does not resolve to exactly one
/// administrator.
pub async fn show(name_or_id: &str) -> Result<(), CliError> {
    let (_, client) = connect()?;
    let mut session = client.login().await?;
    let found = IdentityMirror::new(&session)
        .find_administrator(name_or_id)
        .await;
    session.release().await;

    let admin = found?;
    tracing::info!("{} ({})", admin.name(), admin.href);
    tracing::info!("{}", serde_json::to_string_pretty(&admin.record)?);
    Ok(())
}
