//! SMC connection settings, shared client and per-unit-of-work sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::header::{COOKIE, IF_MATCH, SET_COOKIE};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use smc_connector_core::GrantScope;
use tracing::{debug, instrument, warn};
use url::Url;

use super::resources::{EntryPointList, ResourceKind};
use super::transport::{DEFAULT_TIMEOUT, HttpTransport, SmcRequest, SmcResponse};
use super::SmcError;

/// Where and how to log in to the SMC.
#[derive(Clone)]
pub struct SmcEndpoint {
    pub host: String,
    pub port: u16,
    pub api_version: String,
    /// Administrative domain sent with the login request.
    pub login_domain: String,
    /// API authentication key.
    pub key: SecretString,
}

impl fmt::Debug for SmcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmcEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_version", &self.api_version)
            .field("login_domain", &self.login_domain)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SmcEndpoint {
    /// API base URL: `http://{host}:{port}/{api_version}`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.api_version)
    }

    /// Check that the settings can form a usable base URL.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Config` if host, port or API version is missing or
    /// the resulting URL does not parse.
    pub fn validate(&self) -> Result<(), SmcError> {
        if self.host.trim().is_empty() {
            return Err(SmcError::Config("SMC host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(SmcError::Config("SMC port is not set".to_string()));
        }
        if self.api_version.trim().is_empty() {
            return Err(SmcError::Config("SMC API version is empty".to_string()));
        }
        Url::parse(&self.base_url())
            .map_err(|e| SmcError::Config(format!("invalid SMC base URL: {e}")))?;
        Ok(())
    }
}

/// Shared SMC client: endpoint settings plus HTTP transport.
///
/// Cheap to clone. Holds no session state; call [`SmcClient::session`] or
/// [`SmcClient::login`] to get one.
#[derive(Clone)]
pub struct SmcClient {
    inner: Arc<SmcClientInner>,
}

struct SmcClientInner {
    endpoint: SmcEndpoint,
    transport: HttpTransport,
}

impl fmt::Debug for SmcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmcClient")
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}

impl SmcClient {
    /// Create a client with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Transport` if the HTTP client cannot be built.
    pub fn new(endpoint: SmcEndpoint) -> Result<Self, SmcError> {
        Ok(Self::with_transport(endpoint, HttpTransport::new(DEFAULT_TIMEOUT)?))
    }

    #[must_use]
    pub fn with_transport(endpoint: SmcEndpoint, transport: HttpTransport) -> Self {
        Self {
            inner: Arc::new(SmcClientInner {
                endpoint,
                transport,
            }),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &SmcEndpoint {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        self.inner.endpoint.base_url()
    }

    /// Domain and elements managed permissions are granted against.
    #[must_use]
    pub fn grant_scope(&self) -> GrantScope {
        GrantScope::for_api_base(&self.base_url())
    }

    /// A new, inactive session.
    #[must_use]
    pub fn session(&self) -> SmcSession {
        SmcSession {
            client: self.clone(),
            cookie: None,
            entry_points: HashMap::new(),
        }
    }

    /// A new session, already logged in.
    ///
    /// # Errors
    ///
    /// See [`SmcSession::login`].
    pub async fn login(&self) -> Result<SmcSession, SmcError> {
        let mut session = self.session();
        session.login().await?;
        Ok(session)
    }

    async fn send(&self, request: SmcRequest) -> Result<SmcResponse, SmcError> {
        self.inner.transport.send(request).await
    }
}

/// One authenticated SMC session.
///
/// Active while it holds a session cookie. Owned by exactly one unit of work.
pub struct SmcSession {
    client: SmcClient,
    cookie: Option<String>,
    entry_points: HashMap<String, String>,
}

impl fmt::Debug for SmcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmcSession")
            .field("active", &self.is_active())
            .field("entry_points", &self.entry_points.len())
            .finish_non_exhaustive()
    }
}

impl SmcSession {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cookie.is_some()
    }

    #[must_use]
    pub const fn client(&self) -> &SmcClient {
        &self.client
    }

    /// Log in and discover entry points. No-op if already active.
    ///
    /// # Errors
    ///
    /// - `SmcError::Config` if the endpoint settings are incomplete
    /// - `SmcError::Auth` if the SMC does not answer 200 with a session cookie
    /// - `SmcError::Protocol` if entry-point discovery fails; the session then
    ///   stays inactive
    #[instrument(skip(self), fields(host = %self.client.endpoint().host))]
    pub async fn login(&mut self) -> Result<(), SmcError> {
        if self.is_active() {
            return Ok(());
        }

        let endpoint = self.client.endpoint();
        endpoint.validate()?;

        let url = format!("{}/login", endpoint.base_url());
        let body = serde_json::json!({
            "domain": endpoint.login_domain,
            "authenticationkey": endpoint.key.expose_secret(),
        });
        let response = self
            .client
            .send(SmcRequest::new(Method::POST, &url).json(&body)?)
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SmcError::Auth(format!(
                "login returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let cookie = response
            .header(&SET_COOKIE)
            .and_then(session_cookie)
            .ok_or_else(|| SmcError::Auth("login response carried no session cookie".to_string()))?;
        self.cookie = Some(cookie);

        match self.discover_entry_points().await {
            Ok(entry_points) => {
                debug!(count = entry_points.len(), "Discovered SMC entry points");
                self.entry_points = entry_points;
                Ok(())
            }
            Err(e) => {
                self.cookie = None;
                self.entry_points.clear();
                Err(e)
            }
        }
    }

    async fn discover_entry_points(&self) -> Result<HashMap<String, String>, SmcError> {
        let url = format!("{}/api", self.client.base_url());
        let response = self.get(&url).await?;

        if response.status() != StatusCode::OK {
            return Err(SmcError::Protocol(format!(
                "entry point discovery returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let list: EntryPointList = response
            .json()
            .map_err(|e| SmcError::Protocol(format!("invalid entry point list: {e}")))?;

        Ok(list
            .entry_point
            .into_iter()
            .map(|entry| (entry.rel, entry.href))
            .collect())
    }

    /// Log out. No-op if inactive.
    ///
    /// Only HTTP 204 ends the session.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::UnexpectedStatus` for any other status; the session
    /// then stays active.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<(), SmcError> {
        if !self.is_active() {
            return Ok(());
        }

        let url = self.entry_point(ResourceKind::Logout)?.to_owned();
        let response = self.client.send(self.authed(Method::PUT, &url)?).await?;

        if response.status() == StatusCode::NO_CONTENT {
            self.cookie = None;
            self.entry_points.clear();
            Ok(())
        } else {
            Err(SmcError::UnexpectedStatus {
                status: response.status().as_u16(),
                context: "logout".to_string(),
            })
        }
    }

    /// Log out, logging instead of returning a failure.
    pub async fn release(&mut self) {
        if let Err(e) = self.logout().await {
            warn!(error = %e, "SMC logout failed");
        }
    }

    /// URL the SMC advertised for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Session` if inactive and `SmcError::Protocol` if the
    /// SMC did not advertise the entry point.
    pub fn entry_point(&self, kind: ResourceKind) -> Result<&str, SmcError> {
        if !self.is_active() {
            return Err(SmcError::Session);
        }
        self.entry_points
            .get(kind.entry_point_key())
            .map(String::as_str)
            .ok_or_else(|| {
                SmcError::Protocol(format!(
                    "SMC did not advertise entry point '{}'",
                    kind.entry_point_key()
                ))
            })
    }

    /// All discovered entry points.
    #[must_use]
    pub const fn entry_points(&self) -> &HashMap<String, String> {
        &self.entry_points
    }

    fn authed(&self, method: Method, url: &str) -> Result<SmcRequest, SmcError> {
        let cookie = self.cookie.as_deref().ok_or(SmcError::Session)?;
        Ok(SmcRequest::new(method, url).header(COOKIE, cookie))
    }

    /// Authenticated GET.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Session` if inactive, or a transport error.
    pub async fn get(&self, url: &str) -> Result<SmcResponse, SmcError> {
        self.client.send(self.authed(Method::GET, url)?).await
    }

    /// Authenticated POST with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Session` if inactive, or a transport error.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<SmcResponse, SmcError> {
        let request = self.authed(Method::POST, url)?.json(body)?;
        self.client.send(request).await
    }

    /// Authenticated PUT, optionally with a JSON body and an `If-Match` token.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Session` if inactive, or a transport error.
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
        etag: Option<&str>,
    ) -> Result<SmcResponse, SmcError> {
        let mut request = self.authed(Method::PUT, url)?;
        if let Some(body) = body {
            request = request.json(body)?;
        }
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        self.client.send(request).await
    }

    /// Authenticated DELETE, optionally with an `If-Match` token.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Session` if inactive, or a transport error.
    pub async fn delete(&self, url: &str, etag: Option<&str>) -> Result<SmcResponse, SmcError> {
        let mut request = self.authed(Method::DELETE, url)?;
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        self.client.send(request).await
    }

    /// Read the current `ETag` of `url` and write `body` back conditionally.
    ///
    /// The response is returned as-is; the caller decides what its status
    /// means. A concurrent change between the read and the write makes the
    /// SMC reject the PUT.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or carries no `ETag`.
    #[instrument(skip(self, body))]
    pub async fn conditional_update<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<SmcResponse, SmcError> {
        let current = self.get(url).await?;
        if current.status() != StatusCode::OK {
            return Err(SmcError::from_status(current.status(), url, "read before update"));
        }
        let etag = current
            .etag()
            .ok_or_else(|| SmcError::Protocol(format!("no ETag on {url}")))?
            .to_owned();

        self.put_json(url, Some(body), Some(&etag)).await
    }
}

/// Session token from a `Set-Cookie` value: the text before the first `;`.
fn session_cookie(set_cookie: &str) -> Option<String> {
    let token = set_cookie.split(';').next()?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}
