//! Unified error handling for the inbound API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::provisioning::ProvisionError;
use crate::smc::SmcError;

/// Application-level error type for the inbound API.
#[derive(Debug, Error)]
pub enum AppError {
    /// SMC call failed.
    #[error("SMC error: {0}")]
    Smc(#[from] SmcError),

    /// Provisioning operation failed.
    #[error("{0}")]
    Provision(#[from] ProvisionError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request was understood but could not be applied.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn smc_status(err: &SmcError) -> StatusCode {
    if err.is_lookup() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

impl AppError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Smc(e) | Self::Provision(ProvisionError::Smc(e)) => smc_status(e),
            Self::Provision(
                ProvisionError::InvalidLoginName(_) | ProvisionError::LdapUserNotFound(_),
            )
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Provision(ProvisionError::AlreadyExists(_)) | Self::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Provision(ProvisionError::CreationFailed(_)) => StatusCode::BAD_GATEWAY,
            Self::Provision(ProvisionError::InvalidRoleDefaults(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Connector request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "SMC request failed".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}
