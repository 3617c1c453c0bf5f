//! Single-request HTTP transport for the SMC API.
//!
//! No retries and no connection management beyond what `reqwest` does by
//! default. Responses are fully buffered so callers can inspect status,
//! headers and body independently.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, HeaderName};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::SmcError;

/// Default request timeout. A stuck SMC call blocks its unit of work until
/// this elapses.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One HTTP request to the SMC.
#[derive(Debug, Clone)]
pub struct SmcRequest {
    method: Method,
    url: String,
    headers: Vec<(HeaderName, String)>,
    body: Option<Vec<u8>>,
}

impl SmcRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header to the request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Attach a JSON body and the matching content type.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Json` if the body cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, SmcError> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self.header(CONTENT_TYPE, "application/json"))
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A buffered SMC response.
#[derive(Debug, Clone)]
pub struct SmcResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl SmcResponse {
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The resource version token.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.header(&ETAG)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as (lossy) UTF-8 text, for log messages.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Json` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SmcError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Fail with a status error unless the response has `expected` status.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Conflict` for precondition failures and
    /// `SmcError::UnexpectedStatus` for anything else.
    pub fn expect_status(self, expected: StatusCode, url: &str, context: &str) -> Result<Self, SmcError> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(SmcError::from_status(self.status, url, context))
        }
    }
}

/// Sends [`SmcRequest`]s over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Transport` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, SmcError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Issue one request and buffer the response.
    ///
    /// # Errors
    ///
    /// Returns `SmcError::Transport` on connection failures, timeouts or
    /// invalid header values. HTTP error statuses are not errors here.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, request: SmcRequest) -> Result<SmcResponse, SmcError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(status = status.as_u16(), bytes = body.len(), "SMC response");

        Ok(SmcResponse::new(status, headers, body))
    }
}
