//! Forcepoint SMC REST client.
//!
//! Provides an authenticated, session-based client for the SMC API used to
//! manage administrator accounts and their role permissions.
//!
//! # Architecture
//!
//! - [`SmcClient`] holds connection settings and the HTTP transport. It is
//!   cheap to clone and shared by the reconciliation loop and request handlers.
//! - [`SmcSession`] is one login: session cookie plus the entry points the SMC
//!   advertised for it. Every unit of work owns its own session value.
//! - [`IdentityMirror`] and [`LdapBrowser`] are read-only views borrowed from a
//!   session.
//!
//! # Concurrency
//!
//! All writes are conditional: the current `ETag` is read and sent back as
//! `If-Match`, so a concurrent writer makes the SMC reject the update instead
//! of silently losing it.

pub mod ldap;
pub mod mirror;
pub mod resources;
pub mod session;
pub mod transport;

pub use ldap::{LdapBrowser, LdapUser};
pub use mirror::{IdentityMirror, RoleCatalog};
pub use resources::{
    AdminRecord, AdminSummary, Administrator, ElementRef, NewAdministrator, ResourceKind,
};
pub use session::{SmcClient, SmcEndpoint, SmcSession};
pub use transport::{HttpTransport, SmcRequest, SmcResponse};

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the SMC.
#[derive(Debug, Error)]
pub enum SmcError {
    /// Connection settings are missing or invalid.
    #[error("SMC configuration error: {0}")]
    Config(String),

    /// The SMC rejected the login.
    #[error("SMC authentication failed: {0}")]
    Auth(String),

    /// The SMC answered with an unexpected shape or status.
    #[error("SMC protocol error: {0}")]
    Protocol(String),

    /// An authenticated call was made without an active session.
    #[error("No active SMC session - login required")]
    Session,

    /// A conditional write was rejected because the resource changed.
    #[error("Conflicting update on {url} (HTTP {status})")]
    Conflict { url: String, status: u16 },

    /// A call returned a status the caller cannot accept.
    #[error("Unexpected HTTP status {status} from {context}")]
    UnexpectedStatus { status: u16, context: String },

    /// Lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lookup found more than one candidate.
    #[error("More than one administrator matches: {0}")]
    AmbiguousMatch(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SmcError {
    /// Map a non-accepted response status to an error.
    ///
    /// Precondition failures become [`SmcError::Conflict`].
    #[must_use]
    pub fn from_status(status: StatusCode, url: &str, context: &str) -> Self {
        if status == StatusCode::PRECONDITION_FAILED || status == StatusCode::CONFLICT {
            Self::Conflict {
                url: url.to_owned(),
                status: status.as_u16(),
            }
        } else {
            Self::UnexpectedStatus {
                status: status.as_u16(),
                context: context.to_owned(),
            }
        }
    }

    /// Whether the error is a lookup failure the caller caused (bad request).
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AmbiguousMatch(_))
    }
}
