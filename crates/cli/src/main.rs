//! SMC connector CLI - operator tools for the connector.
//!
//! # Usage
//!
//! ```bash
//! # Run a single reconciliation cycle against the live directory
//! smcctl reconcile once
//!
//! # List SMC administrators
//! smcctl admins list
//!
//! # Show one administrator by login name, email or directory object id
//! smcctl admins show jdoe@example.com
//!
//! # List the roles defined on the SMC
//! smcctl roles list
//! ```
//!
//! # Commands
//!
//! - `reconcile once` - Run one reconciliation cycle and report the outcome
//! - `admins list` / `admins show` - Inspect administrators
//! - `roles list` - Inspect the SMC role catalog
//!
//! Configuration is read from the same environment variables as the
//! connector service.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "smcctl")]
#[command(author, version, about = "SMC connector operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation outside the service loop
    Reconcile {
        #[command(subcommand)]
        action: ReconcileAction,
    },
    /// Inspect SMC administrators
    Admins {
        #[command(subcommand)]
        action: AdminsAction,
    },
    /// Inspect SMC roles
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },
}

#[derive(Subcommand)]
enum ReconcileAction {
    /// Run a single cycle: roles, then deprovisioning
    Once,
}

#[derive(Subcommand)]
enum AdminsAction {
    /// List every administrator with its enabled state and directory id
    List,
    /// Show one administrator
    Show {
        /// Login name, email address or directory object id
        name_or_id: String,
    },
}

#[derive(Subcommand)]
enum RolesAction {
    /// List role names and references
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smcctl=info,smc_connector=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Reconcile { action } => match action {
            ReconcileAction::Once => commands::reconcile::once().await?,
        },
        Commands::Admins { action } => match action {
            AdminsAction::List => commands::admins::list().await?,
            AdminsAction::Show { name_or_id } => commands::admins::show(&name_or_id).await?,
        },
        Commands::Roles { action } => match action {
            RolesAction::List => commands::roles::list().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admins_show() {
        let cli = Cli::try_parse_from(["smcctl", "admins", "show", "jdoe@example.com"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admins {
                action: AdminsAction::Show { name_or_id }
            }) if name_or_id == "jdoe@example.com"
        ));
    }
}
