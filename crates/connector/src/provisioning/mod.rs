//! Single-administrator operations requested through the inbound API.
//!
//! Each operation opens its own SMC session and logs out when it is done,
//! whether or not it succeeded.

use reqwest::StatusCode;
use smc_connector_core::{LoginName, LoginNameError, SmcRole, join_role_names};
use thiserror::Error;
use tracing::{info, instrument};

use crate::reconcile::plan::build_permissions;
use crate::smc::{
    Administrator, IdentityMirror, LdapBrowser, NewAdministrator, ResourceKind, SmcClient,
    SmcError, SmcSession,
};

/// Errors from provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    InvalidLoginName(#[from] LoginNameError),

    #[error("No LDAP user found for {0}")]
    LdapUserNotFound(String),

    #[error("User name {0} already exists")]
    AlreadyExists(String),

    #[error("Unexpected HTTP status {0} while creating administrator")]
    CreationFailed(u16),

    #[error("Invalid default roles: {0}")]
    InvalidRoleDefaults(String),

    #[error(transparent)]
    Smc(#[from] SmcError),
}

/// Roles and account flags given to newly created administrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefaults {
    /// Granted roles in [`RoleDefaults::FLAG_ORDER`].
    pub roles: Vec<SmcRole>,
    pub can_use_api: bool,
    pub allow_sudo: bool,
    pub console_superuser: bool,
    pub allow_to_login_in_shared: bool,
}

impl Default for RoleDefaults {
    fn default() -> Self {
        Self {
            roles: vec![SmcRole::Viewer],
            can_use_api: false,
            allow_sudo: false,
            console_superuser: false,
            allow_to_login_in_shared: true,
        }
    }
}

impl RoleDefaults {
    /// Order in which default role flags are read and granted.
    pub const FLAG_ORDER: [SmcRole; 9] = [
        SmcRole::Viewer,
        SmcRole::LogsViewer,
        SmcRole::ReportsManager,
        SmcRole::Owner,
        SmcRole::Operator,
        SmcRole::Monitor,
        SmcRole::Editor,
        SmcRole::NsxRole,
        SmcRole::Superuser,
    ];

    #[must_use]
    pub fn superuser(&self) -> bool {
        self.roles.contains(&SmcRole::Superuser)
    }

    /// Reject flag combinations the SMC would refuse.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::InvalidRoleDefaults` when console superuser is
    /// requested without the Superuser role.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.console_superuser && !self.superuser() {
            return Err(ProvisionError::InvalidRoleDefaults(
                "console superuser requires the Superuser permission".to_string(),
            ));
        }
        Ok(())
    }
}

/// A newly created administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub name: String,
    /// Reference of the LDAP user the administrator is bound to.
    pub ldap_user: String,
}

/// Creates, toggles and deletes individual administrators.
#[derive(Debug, Clone)]
pub struct Provisioner {
    client: SmcClient,
    defaults: RoleDefaults,
    ldap_domain: String,
    users_ou: String,
}

impl Provisioner {
    #[must_use]
    pub const fn new(
        client: SmcClient,
        defaults: RoleDefaults,
        ldap_domain: String,
        users_ou: String,
    ) -> Self {
        Self {
            client,
            defaults,
            ldap_domain,
            users_ou,
        }
    }

    #[must_use]
    pub const fn client(&self) -> &SmcClient {
        &self.client
    }

    /// Create an administrator bound to the LDAP user for `login_name`.
    ///
    /// # Errors
    ///
    /// - `InvalidLoginName` unless `login_name` is `user@domain`
    /// - `LdapUserNotFound` if the SMC does not know the LDAP user
    /// - `AlreadyExists` if the SMC answers 422
    /// - `CreationFailed` for any other non-201 answer
    #[instrument(skip(self))]
    pub async fn create_administrator(
        &self,
        login_name: &str,
        active: bool,
    ) -> Result<Created, ProvisionError> {
        let login = LoginName::parse(login_name)?;
        let mut session = self.client.login().await?;
        let result = self.create_in(&session, &login, active).await;
        session.release().await;
        result
    }

    async fn create_in(
        &self,
        session: &SmcSession,
        login: &LoginName,
        active: bool,
    ) -> Result<Created, ProvisionError> {
        let name = login.smc_name();
        let ldap = LdapBrowser::new(session);

        let auth_method = ldap.find_auth_method().await?;
        let domain = ldap.find_user_domain(&self.ldap_domain).await?;
        let ldap_user = match ldap.find_user(&domain.href, &self.users_ou, name).await {
            Ok(user) => user,
            Err(SmcError::NotFound(_)) => {
                return Err(ProvisionError::LdapUserNotFound(login.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let ldap_href = ldap_user
            .self_href()
            .ok_or_else(|| ProvisionError::LdapUserNotFound(login.to_string()))?
            .to_owned();

        let catalog = IdentityMirror::new(session).list_roles().await?;
        let desired = build_permissions(&self.defaults.roles, &catalog, &self.client.grant_scope());

        let admin = NewAdministrator {
            name: name.to_owned(),
            enabled: active,
            allow_sudo: self.defaults.allow_sudo,
            console_superuser: self.defaults.console_superuser,
            allowed_to_login_in_shared: self.defaults.allow_to_login_in_shared,
            engine_target: Vec::new(),
            local_admin: false,
            superuser: desired.superuser,
            can_use_api: self.defaults.can_use_api,
            comment: None,
            auth_method: auth_method.href,
            ldap_user: ldap_href.clone(),
            permissions: desired.permissions.into(),
        };

        let url = session.entry_point(ResourceKind::AdminUser)?;
        let response = session.post_json(url, &admin).await?;

        match response.status() {
            StatusCode::CREATED => {
                info!(
                    user = name,
                    roles = %join_role_names(&desired.roles),
                    "Created administrator"
                );
                Ok(Created {
                    name: name.to_owned(),
                    ldap_user: ldap_href,
                })
            }
            StatusCode::UNPROCESSABLE_ENTITY => Err(ProvisionError::AlreadyExists(name.to_owned())),
            status => Err(ProvisionError::CreationFailed(status.as_u16())),
        }
    }

    /// Flip the enabled state of an administrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the administrator cannot be resolved or the SMC
    /// does not answer 200.
    #[instrument(skip(self))]
    pub async fn enable_disable_user(&self, name_or_id: &str) -> Result<(), ProvisionError> {
        let mut session = self.client.login().await?;
        let result = toggle_named(&session, name_or_id, None).await;
        session.release().await;
        result.map(|_| ())
    }

    /// Bring an administrator to the requested enabled state.
    ///
    /// Returns whether a change was made.
    ///
    /// # Errors
    ///
    /// Returns an error if the administrator cannot be resolved or the toggle
    /// fails.
    #[instrument(skip(self))]
    pub async fn set_enabled(&self, name_or_id: &str, enabled: bool) -> Result<bool, ProvisionError> {
        let mut session = self.client.login().await?;
        let result = toggle_named(&session, name_or_id, Some(enabled)).await;
        session.release().await;
        result
    }

    /// Delete an administrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the administrator cannot be resolved or the SMC
    /// does not answer 204.
    #[instrument(skip(self))]
    pub async fn delete_administrator(&self, name_or_id: &str) -> Result<(), ProvisionError> {
        let mut session = self.client.login().await?;
        let result = delete_named(&session, name_or_id).await;
        session.release().await;
        result
    }
}

/// Toggle `name_or_id`, or only bring it to `target` when one is given.
async fn toggle_named(
    session: &SmcSession,
    name_or_id: &str,
    target: Option<bool>,
) -> Result<bool, ProvisionError> {
    let admin = IdentityMirror::new(session)
        .find_administrator(name_or_id)
        .await?;
    if target == Some(admin.record.enabled) {
        return Ok(false);
    }
    toggle(session, &admin).await?;
    Ok(true)
}

async fn toggle(session: &SmcSession, admin: &Administrator) -> Result<(), ProvisionError> {
    let url = format!("{}/enable_disable", admin.href);
    session
        .put_json::<()>(&url, None, admin.etag.as_deref())
        .await?
        .expect_status(StatusCode::OK, &url, "enable/disable administrator")?;
    info!(
        user = admin.name(),
        enabled = !admin.record.enabled,
        "Toggled administrator"
    );
    Ok(())
}

async fn delete_named(session: &SmcSession, name_or_id: &str) -> Result<(), ProvisionError> {
    let admin = IdentityMirror::new(session)
        .find_administrator(name_or_id)
        .await?;
    session
        .delete(&admin.href, admin.etag.as_deref())
        .await?
        .expect_status(StatusCode::NO_CONTENT, &admin.href, "delete administrator")?;
    info!(user = admin.name(), "Deleted administrator");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_role_defaults() {
        let defaults = RoleDefaults::default();
        assert_eq!(defaults.roles, vec![SmcRole::Viewer]);
        assert!(defaults.allow_to_login_in_shared);
        assert!(!defaults.superuser());
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_console_superuser_requires_superuser() {
        let defaults = RoleDefaults {
            console_superuser: true,
            ..RoleDefaults::default()
        };
        assert!(matches!(
            defaults.validate(),
            Err(ProvisionError::InvalidRoleDefaults(_))
        ));

        let defaults = RoleDefaults {
            roles: vec![SmcRole::Superuser],
            console_superuser: true,
            ..RoleDefaults::default()
        };
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_provision_error_display() {
        let err = ProvisionError::AlreadyExists("jdoe".to_string());
        assert_eq!(err.to_string(), "User name jdoe already exists");

        let err: ProvisionError = LoginNameError::NotAnEmail("jdoe".to_string()).into();
        assert_eq!(
            err.to_string(),
            "user loginName is not an email address: jdoe"
        );
    }
}
