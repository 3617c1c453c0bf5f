//! Periodic reconciliation of SMC administrator roles with directory groups.
//!
//! Every cycle opens its own SMC session, computes the target permissions of
//! each administrator from group membership, writes only what differs, then
//! deletes administrators who lost access to the governing application.
//!
//! The directory is authoritative. The SMC is never read back into the
//! directory.

pub mod plan;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::StatusCode;
use smc_connector_core::{PermissionList, SmcRole, join_role_names, permissions_converged};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::directory::{Directory, DirectoryError};
use crate::smc::{AdminSummary, IdentityMirror, RoleCatalog, SmcClient, SmcError, SmcSession};
use plan::{build_permissions, deprovision_candidates, desired_assignments};

/// Why a reconciliation pass stopped early.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("SMC login failed: {0}")]
    Login(#[source] SmcError),

    #[error("SMC roles unavailable after retry: {0}")]
    RolesUnavailable(String),

    #[error("Could not load SMC administrators, check SMC host and key: {0}")]
    Administrators(String),

    #[error("No principals are assigned to application '{0}', refusing to deprovision")]
    NoAssignments(String),

    #[error(transparent)]
    Smc(#[from] SmcError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Timing and scope of the reconciliation loop.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Time between cycles. The first cycle starts one interval after launch.
    pub interval: Duration,
    /// Wait before the single retry of an empty or failed role load.
    pub role_retry_backoff: Duration,
    /// Pause after each attempted permission write.
    pub write_pause: Duration,
    /// Directory application whose assignments gate SMC access.
    pub app_name: String,
}

impl ReconcileSettings {
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            interval: Duration::from_secs(3 * 60),
            role_retry_backoff: Duration::from_secs(120),
            write_pause: Duration::from_secs(1),
            app_name: app_name.into(),
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Administrators whose permissions were written.
    pub updated: Vec<String>,
    /// Administrators already converged.
    pub unchanged: Vec<String>,
    /// Administrators whose read, write or delete failed.
    pub failed: Vec<String>,
    /// Administrators deleted by the deprovisioning pass.
    pub deprovisioned: Vec<String>,
    /// Set when the role pass stopped early.
    pub aborted: Option<String>,
    /// Set when the deprovisioning pass stopped early.
    pub deprovision_aborted: Option<String>,
}

impl CycleReport {
    /// Number of SMC writes the cycle performed.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.updated.len() + self.deprovisioned.len()
    }

    fn log(&self) {
        info!(
            updated = self.updated.len(),
            unchanged = self.unchanged.len(),
            failed = self.failed.len(),
            deprovisioned = self.deprovisioned.len(),
            aborted = self.aborted.as_deref().unwrap_or("-"),
            "Reconciliation cycle finished"
        );
    }
}

/// The reconciliation loop.
pub struct Reconciler<D> {
    client: SmcClient,
    directory: D,
    settings: ReconcileSettings,
}

impl<D: Directory + 'static> Reconciler<D> {
    #[must_use]
    pub const fn new(client: SmcClient, directory: D, settings: ReconcileSettings) -> Self {
        Self {
            client,
            directory,
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Run the loop on a background task until `shutdown` flips to `true` or
    /// its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run cycles forever, one per interval.
    ///
    /// A shutdown signal also interrupts a cycle in progress; its SMC session
    /// is then left to expire on the server.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.settings.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Reconciliation loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                report = self.run_cycle() => report.log(),
                _ = shutdown.changed() => {
                    warn!("Shutdown interrupted a reconciliation cycle");
                    break;
                }
            }
        }

        info!("Reconciliation loop stopped");
    }

    /// Run one full cycle: roles, then deprovisioning.
    ///
    /// Never fails; problems are logged and recorded in the report.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut session = match self.client.login().await {
            Ok(session) => session,
            Err(e) => {
                let e = ReconcileError::Login(e);
                error!(error = %e, "Reconciliation cycle aborted");
                report.aborted = Some(e.to_string());
                return report;
            }
        };

        if let Err(e) = self.apply_roles(&session, &mut report).await {
            error!(error = %e, "Role reconciliation aborted");
            report.aborted = Some(e.to_string());
        }

        if let Err(e) = self.deprovision(&session, &mut report).await {
            error!(error = %e, "Deprovisioning aborted");
            report.deprovision_aborted = Some(e.to_string());
        }

        session.release().await;
        report
    }

    async fn load_roles(&self, mirror: IdentityMirror<'_>) -> Result<RoleCatalog, ReconcileError> {
        match mirror.list_roles().await {
            Ok(catalog) if !catalog.is_empty() => return Ok(catalog),
            Ok(_) => warn!(
                retry_in_secs = self.settings.role_retry_backoff.as_secs(),
                "SMC returned no roles, retrying"
            ),
            Err(e) => warn!(
                error = %e,
                retry_in_secs = self.settings.role_retry_backoff.as_secs(),
                "Failed to load SMC roles, retrying"
            ),
        }

        tokio::time::sleep(self.settings.role_retry_backoff).await;

        match mirror.list_roles().await {
            Ok(catalog) if !catalog.is_empty() => Ok(catalog),
            Ok(_) => Err(ReconcileError::RolesUnavailable(
                "SMC returned no roles".to_string(),
            )),
            Err(e) => Err(ReconcileError::RolesUnavailable(e.to_string())),
        }
    }

    async fn load_administrators(
        &self,
        mirror: IdentityMirror<'_>,
    ) -> Result<Vec<AdminSummary>, ReconcileError> {
        let admins = mirror
            .list_administrators()
            .await
            .map_err(|e| ReconcileError::Administrators(e.to_string()))?;
        if admins.is_empty() {
            return Err(ReconcileError::Administrators(
                "SMC returned no administrators".to_string(),
            ));
        }
        Ok(admins)
    }

    /// Group members per recognized role, in role order.
    async fn load_groups(&self, catalog: &RoleCatalog) -> Vec<(SmcRole, Vec<String>)> {
        let mut groups = Vec::new();
        for role in SmcRole::ALL {
            if !catalog.contains(role.name()) {
                warn!(role = %role, "Role is not configured on the SMC, skipping");
                continue;
            }
            match self.directory.list_group_members(role.name()).await {
                Ok(members) => {
                    debug!(role = %role, members = members.len(), "Loaded group");
                    groups.push((role, members));
                }
                Err(e) => warn!(role = %role, error = %e, "Group lookup failed, skipping"),
            }
        }
        groups
    }

    async fn apply_roles(
        &self,
        session: &SmcSession,
        report: &mut CycleReport,
    ) -> Result<(), ReconcileError> {
        let mirror = IdentityMirror::new(session);
        let catalog = self.load_roles(mirror).await?;
        let admins = self.load_administrators(mirror).await?;

        let hrefs: HashMap<&str, &str> = admins
            .iter()
            .map(|a| (a.name.as_str(), a.href.as_str()))
            .collect();
        let names: HashSet<&str> = hrefs.keys().copied().collect();

        let groups = self.load_groups(&catalog).await;
        let assignments = desired_assignments(&groups, &names);
        let scope = self.client.grant_scope();

        for (user, roles) in &assignments {
            let Some(href) = hrefs.get(user.as_str()) else {
                continue;
            };

            let admin = match mirror.administrator(href).await {
                Ok(admin) => admin,
                Err(e) => {
                    error!(user, error = %e, "Failed to read administrator");
                    report.failed.push(user.clone());
                    continue;
                }
            };

            let desired = build_permissions(roles, &catalog, &scope);
            if permissions_converged(&admin.record.permissions.permission, &desired.permissions) {
                debug!(user, "Permissions already converged");
                report.unchanged.push(user.clone());
                continue;
            }

            let mut record = admin.record;
            record.permissions = PermissionList::from(desired.permissions);
            record.superuser = desired.superuser;

            match session.conditional_update(href, &record).await {
                Ok(response) if response.status() == StatusCode::OK => {
                    info!(
                        user,
                        roles = %join_role_names(&desired.roles),
                        "Applied roles"
                    );
                    report.updated.push(user.clone());
                }
                Ok(response) => {
                    error!(
                        user,
                        status = response.status().as_u16(),
                        body = %response.text(),
                        "SMC rejected permission update"
                    );
                    report.failed.push(user.clone());
                }
                Err(e) => {
                    error!(user, error = %e, "Permission update failed");
                    report.failed.push(user.clone());
                }
            }

            // Every attempted write is followed by the pause, accepted or not
            tokio::time::sleep(self.settings.write_pause).await;
        }

        Ok(())
    }

    async fn deprovision(
        &self,
        session: &SmcSession,
        report: &mut CycleReport,
    ) -> Result<(), ReconcileError> {
        let app = &self.settings.app_name;
        let ids = self.directory.list_app_assigned_principals(app).await?;
        let assigned = self.directory.resolve_principal_names(&ids).await?;
        if assigned.is_empty() {
            return Err(ReconcileError::NoAssignments(app.clone()));
        }
        let directory_users = self.directory.list_all_users().await?;

        let mirror = IdentityMirror::new(session);
        let admins = mirror.list_administrators().await?;
        let names: Vec<String> = admins.iter().map(|a| a.name.clone()).collect();

        for name in deprovision_candidates(&names, &directory_users, &assigned) {
            let Some(summary) = admins.iter().find(|a| a.name == name) else {
                continue;
            };

            match self.delete(session, mirror, &summary.href).await {
                Ok(()) => {
                    info!(user = %name, "Deleted administrator no longer assigned to the application");
                    report.deprovisioned.push(name);
                }
                Err(e) => {
                    error!(user = %name, error = %e, "Failed to delete administrator");
                    report.failed.push(name);
                }
            }
        }

        Ok(())
    }

    async fn delete(
        &self,
        session: &SmcSession,
        mirror: IdentityMirror<'_>,
        href: &str,
    ) -> Result<(), SmcError> {
        let admin = mirror.administrator(href).await?;
        session
            .delete(href, admin.etag.as_deref())
            .await?
            .expect_status(StatusCode::NO_CONTENT, href, "delete administrator")?;
        Ok(())
    }
}
