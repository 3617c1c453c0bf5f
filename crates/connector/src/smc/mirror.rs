//! Read-only queries against administrators and roles.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::resources::{AdminRecord, AdminSummary, Administrator, ResourceKind, ResultList};
use super::session::SmcSession;
use super::SmcError;

/// Role name to role reference, as configured on the SMC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleCatalog {
    roles: BTreeMap<String, String>,
}

impl RoleCatalog {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.roles.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roles.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RoleCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            roles: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Read-only view of the SMC identity data, borrowed from an active session.
#[derive(Debug, Clone, Copy)]
pub struct IdentityMirror<'a> {
    session: &'a SmcSession,
}

impl<'a> IdentityMirror<'a> {
    #[must_use]
    pub const fn new(session: &'a SmcSession) -> Self {
        Self { session }
    }

    async fn list(&self, kind: ResourceKind) -> Result<ResultList, SmcError> {
        let url = self.session.entry_point(kind)?;
        let response = self
            .session
            .get(url)
            .await?
            .expect_status(StatusCode::OK, url, &format!("list {kind}"))?;
        response.json()
    }

    /// All administrators, name and href only.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be read.
    #[instrument(skip(self))]
    pub async fn list_administrators(&self) -> Result<Vec<AdminSummary>, SmcError> {
        Ok(self.list(ResourceKind::AdminUser).await?.result)
    }

    /// One administrator document with its current `ETag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or decoded.
    pub async fn administrator(&self, href: &str) -> Result<Administrator, SmcError> {
        let response = self
            .session
            .get(href)
            .await?
            .expect_status(StatusCode::OK, href, "read administrator")?;
        let record: AdminRecord = response.json()?;

        Ok(Administrator {
            href: href.to_owned(),
            etag: response.etag().map(str::to_owned),
            record,
        })
    }

    /// Resolve a login name, email or directory object id to exactly one
    /// administrator.
    ///
    /// For an email address only the part before `@` is matched.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::NotFound` or `SmcError::AmbiguousMatch` when the
    /// query does not identify exactly one administrator.
    #[instrument(skip(self))]
    pub async fn find_administrator(&self, name_or_id: &str) -> Result<Administrator, SmcError> {
        let query = name_or_id.split('@').next().unwrap_or(name_or_id);

        let mut matches = Vec::new();
        for summary in self.list_administrators().await? {
            let admin = self.administrator(&summary.href).await?;
            if admin.matches(query) {
                matches.push(admin);
            }
        }

        debug!(query, matches = matches.len(), "Administrator lookup");

        let mut matches = matches.into_iter();
        match (matches.next(), matches.next()) {
            (Some(admin), None) => Ok(admin),
            (None, _) => Err(SmcError::NotFound(name_or_id.to_owned())),
            (Some(_), Some(_)) => Err(SmcError::AmbiguousMatch(name_or_id.to_owned())),
        }
    }

    /// The SMC role catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be read.
    #[instrument(skip(self))]
    pub async fn list_roles(&self) -> Result<RoleCatalog, SmcError> {
        Ok(self
            .list(ResourceKind::Role)
            .await?
            .result
            .into_iter()
            .map(|role| (role.name, role.href))
            .collect())
    }
}
