//! Directory backed by the Azure CLI.
//!
//! Each query runs one `az` invocation with tab-separated output. Arguments
//! are passed directly to the process, never through a shell.

use std::process::Stdio;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{Directory, DirectoryError};

/// Upper bound for a single `az` invocation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

const GRAPH_BASE: &str = "https://graph.microsoft.com/beta";

/// [`Directory`] implementation that shells out to `az`.
#[derive(Debug, Clone)]
pub struct AzureCliDirectory {
    program: String,
}

impl AzureCliDirectory {
    /// Use the `az` executable at `program` (a path or a name on `PATH`).
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Sign in with an administrator account.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::CommandFailed` if the credentials are rejected.
    #[instrument(skip(self, password))]
    pub async fn login(&self, user: &str, password: &SecretString) -> Result<(), DirectoryError> {
        let shown = format!("{} login -u {user} -p ***", self.program);
        let output = self
            .output(
                &["login", "-u", user, "-p", password.expose_secret()],
                &shown,
            )
            .await?;

        debug!(bytes = output.len(), "az login completed");
        info!(user, "Logged in to Azure");
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<String>, DirectoryError> {
        let shown = format!("{} {}", self.program, args.join(" "));
        let output = self.output(args, &shown).await?;
        Ok(parse_tsv(&output))
    }

    async fn output(&self, args: &[&str], shown: &str) -> Result<String, DirectoryError> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| DirectoryError::CommandFailed {
                command: shown.to_owned(),
                stderr: format!("timed out after {}s", COMMAND_TIMEOUT.as_secs()),
            })??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !output.status.success() {
            return Err(DirectoryError::CommandFailed {
                command: shown.to_owned(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            // az prints deprecation notices on stderr even on success
            warn!(command = shown, %stderr, "az reported warnings");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Directory for AzureCliDirectory {
    #[instrument(skip(self))]
    async fn list_group_members(&self, group: &str) -> Result<Vec<String>, DirectoryError> {
        self.run(&[
            "ad",
            "group",
            "member",
            "list",
            "--group",
            group,
            "--query",
            "[].mailNickname",
            "-o",
            "tsv",
        ])
        .await
    }

    #[instrument(skip(self))]
    async fn list_all_users(&self) -> Result<Vec<String>, DirectoryError> {
        self.run(&["ad", "user", "list", "--query", "[].mailNickname", "-o", "tsv"])
            .await
    }

    #[instrument(skip(self))]
    async fn list_app_assigned_principals(&self, app: &str) -> Result<Vec<String>, DirectoryError> {
        let app_id = self
            .run(&["ad", "sp", "list", "--display-name", app, "--query", "[].id", "-o", "tsv"])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::EmptyAppId(app.to_owned()))?;

        let uri = format!("{GRAPH_BASE}/servicePrincipals/{app_id}/appRoleAssignedTo");
        self.run(&[
            "rest",
            "--method",
            "GET",
            "--uri",
            &uri,
            "--query",
            "value[].principalId",
            "-o",
            "tsv",
        ])
        .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn resolve_principal_names(&self, ids: &[String]) -> Result<Vec<String>, DirectoryError> {
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            let resolved = self
                .run(&["ad", "user", "show", "--id", id, "--query", "mailNickname", "-o", "tsv"])
                .await?;
            match resolved.into_iter().next() {
                Some(name) => names.push(name),
                None => warn!(id, "Principal has no login name"),
            }
        }
        Ok(names)
    }
}

/// One value per non-empty line.
fn parse_tsv(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}
