//! SMC resource kinds and wire documents.

use std::fmt;

use serde::{Deserialize, Serialize};
use smc_connector_core::{PermissionList, last_path_segment};

/// Resource collections the connector uses, keyed by the entry-point name the
/// SMC advertises for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    AdminUser,
    Role,
    Logout,
    AuthenticationService,
    ExternalLdapUserDomain,
}

impl ResourceKind {
    #[must_use]
    pub const fn entry_point_key(self) -> &'static str {
        match self {
            Self::AdminUser => "admin_user",
            Self::Role => "role",
            Self::Logout => "logout",
            Self::AuthenticationService => "authentication_service",
            Self::ExternalLdapUserDomain => "external_ldap_user_domain",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point_key())
    }
}

/// `GET {base}/api` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntryPointList {
    #[serde(default)]
    pub entry_point: Vec<EntryPoint>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntryPoint {
    pub rel: String,
    pub href: String,
}

/// Collection listing: `{"result": [...]}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultList {
    #[serde(default)]
    pub result: Vec<ElementRef>,
}

/// One entry of a collection listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ElementRef {
    pub name: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// An administrator as listed in the `admin_user` collection.
pub type AdminSummary = ElementRef;

/// The administrator document.
///
/// Fields the connector does not manage are kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdminRecord {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub superuser: bool,
    #[serde(rename = "is_user_locked", default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap_user: Option<String>,
    #[serde(default)]
    pub permissions: PermissionList,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An administrator document together with where it lives and its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Administrator {
    pub href: String,
    pub etag: Option<String>,
    pub record: AdminRecord,
}

impl Administrator {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Directory object id: trailing path segment of the linked LDAP user.
    #[must_use]
    pub fn ldap_user_id(&self) -> Option<&str> {
        self.record
            .ldap_user
            .as_deref()
            .map(last_path_segment)
            .filter(|id| !id.is_empty())
    }

    /// Whether `query` names this administrator by login or directory id.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        self.record.name == query || self.ldap_user_id() == Some(query)
    }
}

/// Body of an administrator creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAdministrator {
    pub name: String,
    pub enabled: bool,
    pub allow_sudo: bool,
    pub console_superuser: bool,
    pub allowed_to_login_in_shared: bool,
    pub engine_target: Vec<String>,
    pub local_admin: bool,
    pub superuser: bool,
    pub can_use_api: bool,
    pub comment: Option<String>,
    pub auth_method: String,
    pub ldap_user: String,
    pub permissions: PermissionList,
}
