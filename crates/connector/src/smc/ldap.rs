//! Navigation of the SMC's external LDAP user tree.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::resources::{ElementRef, ResourceKind, ResultList};
use super::session::SmcSession;
use super::SmcError;

/// Name of the authentication service used for directory-backed accounts.
pub const LDAP_AUTH_SERVICE: &str = "LDAP Authentication";

const LDAP_USER_TYPE: &str = "external_ldap_user";

/// An external LDAP user as the SMC sees it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LdapUser {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub link: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

impl LdapUser {
    /// The user's own reference, used as `ldap_user` on administrators.
    #[must_use]
    pub fn self_href(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.rel == "self")
            .map(|l| l.href.as_str())
    }
}

/// Read-only LDAP tree browser, borrowed from an active session.
#[derive(Debug, Clone, Copy)]
pub struct LdapBrowser<'a> {
    session: &'a SmcSession,
}

impl<'a> LdapBrowser<'a> {
    #[must_use]
    pub const fn new(session: &'a SmcSession) -> Self {
        Self { session }
    }

    async fn list_named(&self, kind: ResourceKind, name: &str) -> Result<ElementRef, SmcError> {
        let url = self.session.entry_point(kind)?;
        let list: ResultList = self
            .session
            .get(url)
            .await?
            .expect_status(StatusCode::OK, url, &format!("list {kind}"))?
            .json()?;

        list.result
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| SmcError::NotFound(format!("{kind} '{name}'")))
    }

    /// The LDAP authentication service.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::NotFound` if the SMC has no such service.
    pub async fn find_auth_method(&self) -> Result<ElementRef, SmcError> {
        self.list_named(ResourceKind::AuthenticationService, LDAP_AUTH_SERVICE)
            .await
    }

    /// The external LDAP user domain called `domain`.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::NotFound` if no domain has that name.
    pub async fn find_user_domain(&self, domain: &str) -> Result<ElementRef, SmcError> {
        self.list_named(ResourceKind::ExternalLdapUserDomain, domain)
            .await
    }

    /// Children of an LDAP tree node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be browsed.
    pub async fn browse(&self, href: &str) -> Result<Vec<ElementRef>, SmcError> {
        let url = format!("{}/browse", href.trim_end_matches('/'));
        let list: ResultList = self
            .session
            .get(&url)
            .await?
            .expect_status(StatusCode::OK, &url, "browse LDAP node")?
            .json()?;
        Ok(list.result)
    }

    /// Find the user called `name` inside the organizational unit `ou` of the
    /// user domain at `domain_href`.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::NotFound` if the unit or the user does not exist.
    #[instrument(skip(self))]
    pub async fn find_user(
        &self,
        domain_href: &str,
        ou: &str,
        name: &str,
    ) -> Result<LdapUser, SmcError> {
        let unit = self
            .browse(domain_href)
            .await?
            .into_iter()
            .find(|e| e.name == ou)
            .ok_or_else(|| SmcError::NotFound(format!("organizational unit '{ou}'")))?;

        let candidates: Vec<ElementRef> = self
            .browse(&unit.href)
            .await?
            .into_iter()
            .filter(|e| e.kind.as_deref() == Some(LDAP_USER_TYPE))
            .collect();
        debug!(ou, candidates = candidates.len(), "Browsed LDAP users");

        for candidate in candidates {
            let user: LdapUser = self
                .session
                .get(&candidate.href)
                .await?
                .expect_status(StatusCode::OK, &candidate.href, "read LDAP user")?
                .json()?;
            if user.name == name {
                return Ok(user);
            }
        }

        Err(SmcError::NotFound(format!("LDAP user '{name}'")))
    }
}
