//! In-memory [`Directory`] for tests and dry runs.
//!
//! State lives behind a `tokio::sync::RwLock` and is shared between clones, so
//! a test can hand one clone to the reconciler and keep mutating the other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{Directory, DirectoryError};

#[derive(Debug, Default)]
struct State {
    groups: HashMap<String, Vec<String>>,
    users: Vec<String>,
    /// App name to assigned principal ids.
    apps: HashMap<String, Vec<String>>,
    /// Principal id to login name.
    principals: HashMap<String, String>,
    failing_groups: HashSet<String>,
}

/// A directory held entirely in memory.
///
/// Build one with [`InMemoryDirectory::builder`]. Clones share state, so the
/// async setters are visible through every clone.
///
/// Unknown groups have no members. Unknown applications fail like a missing
/// app id does against the real directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<State>>,
}

/// Setup for an [`InMemoryDirectory`] before it is shared.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryBuilder {
    state: State,
}

impl InMemoryDirectoryBuilder {
    /// Add a directory user.
    #[must_use]
    pub fn with_user(mut self, name: &str) -> Self {
        if !self.state.users.iter().any(|u| u == name) {
            self.state.users.push(name.to_owned());
        }
        self
    }

    /// Set the members of `group`.
    #[must_use]
    pub fn with_group(mut self, group: &str, members: &[&str]) -> Self {
        self.state.groups.insert(
            group.to_owned(),
            members.iter().map(|m| (*m).to_owned()).collect(),
        );
        self
    }

    /// Assign the user `name` (principal `id`) to `app`.
    #[must_use]
    pub fn with_app_assignment(mut self, app: &str, id: &str, name: &str) -> Self {
        self.state
            .apps
            .entry(app.to_owned())
            .or_default()
            .push(id.to_owned());
        self.state.principals.insert(id.to_owned(), name.to_owned());
        self
    }

    #[must_use]
    pub fn build(self) -> InMemoryDirectory {
        InMemoryDirectory {
            state: Arc::new(RwLock::new(self.state)),
        }
    }
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> InMemoryDirectoryBuilder {
        InMemoryDirectoryBuilder::default()
    }

    /// Replace the members of `group`.
    pub async fn set_group_members(&self, group: &str, members: &[&str]) {
        self.state.write().await.groups.insert(
            group.to_owned(),
            members.iter().map(|m| (*m).to_owned()).collect(),
        );
    }

    /// Remove every assignment of `id` to `app`.
    pub async fn unassign(&self, app: &str, id: &str) {
        if let Some(ids) = self.state.write().await.apps.get_mut(app) {
            ids.retain(|i| i != id);
        }
    }

    /// Make lookups of `group` fail.
    pub async fn fail_group(&self, group: &str) {
        self.state.write().await.failing_groups.insert(group.to_owned());
    }
}

impl Directory for InMemoryDirectory {
    async fn list_group_members(&self, group: &str) -> Result<Vec<String>, DirectoryError> {
        let state = self.state.read().await;
        if state.failing_groups.contains(group) {
            return Err(DirectoryError::CommandFailed {
                command: format!("list members of {group}"),
                stderr: "group lookup failed".to_string(),
            });
        }
        Ok(state.groups.get(group).cloned().unwrap_or_default())
    }

    async fn list_all_users(&self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.state.read().await.users.clone())
    }

    async fn list_app_assigned_principals(&self, app: &str) -> Result<Vec<String>, DirectoryError> {
        self.state
            .read()
            .await
            .apps
            .get(app)
            .cloned()
            .ok_or_else(|| DirectoryError::EmptyAppId(app.to_owned()))
    }

    async fn resolve_principal_names(&self, ids: &[String]) -> Result<Vec<String>, DirectoryError> {
        let state = self.state.read().await;
        ids.iter()
            .map(|id| {
                state
                    .principals
                    .get(id)
                    .cloned()
                    .ok_or_else(|| DirectoryError::NotFound(id.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builders_and_queries() {
        let directory = InMemoryDirectory::builder()
            .with_user("alice")
            .with_user("bob")
            .with_user("alice")
            .with_group("Editor", &["alice"])
            .with_app_assignment("smc", "id-1", "alice")
            .build();

        assert_eq!(directory.list_all_users().await.unwrap(), vec!["alice", "bob"]);
        assert_eq!(directory.list_group_members("Editor").await.unwrap(), vec!["alice"]);
        assert!(directory.list_group_members("Owner").await.unwrap().is_empty());

        let ids = directory.list_app_assigned_principals("smc").await.unwrap();
        assert_eq!(ids, vec!["id-1"]);
        assert_eq!(
            directory.resolve_principal_names(&ids).await.unwrap(),
            vec!["alice"]
        );
    }

    #[tokio::test]
    async fn test_unknown_app_fails() {
        let directory = InMemoryDirectory::new();
        assert!(matches!(
            directory.list_app_assigned_principals("smc").await,
            Err(DirectoryError::EmptyAppId(_))
        ));
    }

    #[tokio::test]
    async fn test_mutations_visible_through_clones() {
        let directory = InMemoryDirectory::builder()
            .with_app_assignment("smc", "id-1", "alice")
            .build();
        let shared = directory.clone();

        shared.set_group_members("Viewer", &["alice"]).await;
        shared.fail_group("Owner").await;
        shared.unassign("smc", "id-1").await;

        assert_eq!(directory.list_group_members("Viewer").await.unwrap(), vec!["alice"]);
        assert!(directory.list_group_members("Owner").await.is_err());
        assert!(directory.list_app_assigned_principals("smc").await.unwrap().is_empty());
    }
}
