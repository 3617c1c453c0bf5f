//! Token permission check.
//!
//! The token issuer asks whether a user may obtain an SMC API token. The
//! caller proves it belongs to this connector with the product name and the
//! SMC key, and the user must be exactly one SMC administrator.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::smc::{IdentityMirror, SmcError};
use crate::state::AppState;

/// Token permission request.
#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "productName")]
    pub product_name: String,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("product_name", &self.product_name)
            .finish()
    }
}

/// Token permission decision.
///
/// `allow` is the string `"true"` or `"false"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDecision {
    pub allow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TokenDecision {
    fn allow() -> Self {
        Self {
            allow: "true".to_string(),
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: "false".to_string(),
            reason: Some(reason.into()),
        }
    }
}

impl IntoResponse for TokenDecision {
    fn into_response(self) -> Response {
        let status = if self.reason.is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::OK
        };
        (status, Json(self)).into_response()
    }
}

/// Decide whether `username` may be issued an API token.
///
/// POST /api/v1/TokenPermission
///
/// Denials are answered with 400 and a reason.
///
/// # Errors
///
/// Returns `AppError` if the SMC cannot be reached.
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn permission(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<TokenDecision, AppError> {
    if request.product_name != state.product_name() {
        tracing::error!(
            product_name = %request.product_name,
            "Product name does not match the connector's name"
        );
        return Ok(TokenDecision::deny("The product name is not valid"));
    }

    if request.password != state.smc().endpoint().key.expose_secret() {
        tracing::error!("The given password is not valid");
        return Ok(TokenDecision::deny("The given password is not valid"));
    }

    let mut session = state.smc().login().await?;
    let found = IdentityMirror::new(&session)
        .find_administrator(&request.username)
        .await;
    session.release().await;

    match found {
        Ok(_) => {
            tracing::info!("Granting token permission");
            Ok(TokenDecision::allow())
        }
        Err(SmcError::NotFound(_)) => {
            tracing::error!("User does not exist on the SMC");
            Ok(TokenDecision::deny(format!(
                "user does not exist: {}",
                request.username
            )))
        }
        Err(e @ SmcError::AmbiguousMatch(_)) => {
            tracing::error!(error = %e, "User lookup is ambiguous");
            Ok(TokenDecision::deny(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decision_body() {
        assert_eq!(
            serde_json::to_value(TokenDecision::allow()).unwrap(),
            json!({"allow": "true"})
        );
        assert_eq!(
            serde_json::to_value(TokenDecision::deny("nope")).unwrap(),
            json!({"allow": "false", "reason": "nope"})
        );
    }

    #[test]
    fn test_decision_status() {
        assert_eq!(TokenDecision::allow().into_response().status(), StatusCode::OK);
        assert_eq!(
            TokenDecision::deny("nope").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_request_debug_redacts_password() {
        let request: TokenRequest = serde_json::from_value(json!({
            "username": "jdoe",
            "password": "hunter2",
            "productName": "smc"
        }))
        .unwrap();
        let debug = format!("{request:?}");
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter2"));
    }
}
