//! Read-only access to the external directory.
//!
//! The directory is the source of truth for who holds which role and who is
//! allowed to use the SMC at all. Nothing is cached: every reconciliation
//! cycle asks again.

pub mod azure_cli;
pub mod memory;

pub use azure_cli::AzureCliDirectory;
pub use memory::{InMemoryDirectory, InMemoryDirectoryBuilder};

use thiserror::Error;

/// Errors returned by a [`Directory`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory command could not be started.
    #[error("Failed to run directory command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The directory command ran and reported a failure.
    #[error("Directory command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The governing application could not be resolved.
    #[error("No application id found for '{0}'")]
    EmptyAppId(String),

    /// A group or user the caller asked for does not exist.
    #[error("Directory entry not found: {0}")]
    NotFound(String),
}

/// Directory queries the connector depends on.
///
/// All names returned are login names (the part of a user principal name
/// before `@`), which is how administrators are named on the SMC.
pub trait Directory: Send + Sync {
    /// Login names of the members of `group`.
    fn list_group_members(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<String>, DirectoryError>> + Send;

    /// Login names of every user in the directory.
    fn list_all_users(&self) -> impl Future<Output = Result<Vec<String>, DirectoryError>> + Send;

    /// Object ids of the principals assigned to the application `app`.
    fn list_app_assigned_principals(
        &self,
        app: &str,
    ) -> impl Future<Output = Result<Vec<String>, DirectoryError>> + Send;

    /// Login names for the given principal ids, in the same order.
    fn resolve_principal_names(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<String>, DirectoryError>> + Send;
}
