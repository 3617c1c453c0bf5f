//! Administrator route handlers.
//!
//! The identity provider drives these endpoints: it lists, creates, toggles
//! and deletes SMC administrators one at a time.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::AppError;
use crate::smc::{Administrator, IdentityMirror, SmcError, SmcSession};
use crate::state::AppState;

/// Query parameters for the administrator listing.
#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    /// Login name, email or directory object id.
    pub id: Option<String>,
}

/// One administrator as seen by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub active: bool,
    pub name: String,
    /// Directory object id, empty when the administrator has no LDAP link.
    pub id: String,
}

impl From<&Administrator> for UserEntry {
    fn from(admin: &Administrator) -> Self {
        Self {
            active: admin.record.enabled,
            name: admin.name().to_owned(),
            id: admin.ldap_user_id().unwrap_or_default().to_owned(),
        }
    }
}

/// List administrators, or look up a single one.
///
/// GET /api/v1/Users?id=<name-or-id>
///
/// An unknown `id` yields an empty list.
///
/// # Errors
///
/// Returns `AppError` if the SMC cannot be read.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<UserEntry>>, AppError> {
    let id = query.id.filter(|id| !id.is_empty());

    let mut session = state.smc().login().await?;
    let result = collect_users(&session, id.as_deref()).await;
    session.release().await;

    let users = result?;
    tracing::info!(count = users.len(), "Listed administrators");
    Ok(Json(users))
}

async fn collect_users(session: &SmcSession, id: Option<&str>) -> Result<Vec<UserEntry>, SmcError> {
    let mirror = IdentityMirror::new(session);

    if let Some(id) = id {
        return match mirror.find_administrator(id).await {
            Ok(admin) => Ok(vec![UserEntry::from(&admin)]),
            Err(SmcError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
    }

    let mut users = Vec::new();
    for summary in mirror.list_administrators().await? {
        let admin = mirror.administrator(&summary.href).await?;
        users.push(UserEntry::from(&admin));
    }
    Ok(users)
}

/// Administrator creation request.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub login_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Administrator creation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// Reference of the LDAP user the new administrator is bound to.
    #[serde(rename = "userUrl")]
    pub user_url: String,
}

/// Create an administrator for a directory user.
///
/// POST /api/v1/CreateUsers
///
/// # Errors
///
/// - 400 for a malformed login name or an unknown LDAP user
/// - 422 if the administrator already exists
/// - 502 if the SMC refuses the creation
#[instrument(skip(state, request), fields(login_name = %request.login_name))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = state
        .provisioner()
        .create_administrator(&request.login_name, request.active)
        .await?;

    tracing::info!(
        user = %created.name,
        display_name = request.display_name.as_deref().unwrap_or("-"),
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user_url: created.ldap_user,
        }),
    ))
}

/// One patch operation.
#[derive(Debug, Deserialize)]
pub struct Operation {
    pub op: String,
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

impl Operation {
    fn replaces_active(&self) -> bool {
        self.op.eq_ignore_ascii_case("replace") && self.path == "active"
    }

    /// Requested enabled state, when the value carries one.
    fn target(&self) -> Option<bool> {
        match &self.value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Administrator patch request.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// Apply patch operations to an administrator.
///
/// POST /api/v1/UpdateUsers
///
/// Only `Replace` of `active` is acted on. A boolean value sets the enabled
/// state; any other value toggles it. Other operations are ignored.
///
/// # Errors
///
/// Returns 422 if an enabled-state change cannot be applied.
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
pub async fn update(
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<StatusCode, AppError> {
    for operation in request.operations.iter().filter(|o| o.replaces_active()) {
        let provisioner = state.provisioner();
        let result = match operation.target() {
            Some(enabled) => provisioner
                .set_enabled(&request.user_id, enabled)
                .await
                .map(|_| ()),
            None => provisioner.enable_disable_user(&request.user_id).await,
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to update enabled state");
            return Err(AppError::Unprocessable(e.to_string()));
        }
    }

    tracing::info!("Updated user");
    Ok(StatusCode::OK)
}

/// Delete an administrator.
///
/// DELETE /api/v1/Users/{id}
///
/// # Errors
///
/// Returns 400 if `id` does not resolve to exactly one administrator.
#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.provisioner().delete_administrator(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn operation(value: Value) -> Operation {
        serde_json::from_value(json!({"op": "Replace", "path": "active", "value": value})).unwrap()
    }

    #[test]
    fn test_operation_target() {
        assert_eq!(operation(json!(true)).target(), Some(true));
        assert_eq!(operation(json!("false")).target(), Some(false));
        assert_eq!(operation(json!(null)).target(), None);
        assert_eq!(operation(json!({"active": true})).target(), None);
    }

    #[test]
    fn test_only_replace_active_is_applied() {
        assert!(operation(json!(true)).replaces_active());

        let other: Operation =
            serde_json::from_value(json!({"op": "Replace", "path": "displayName", "value": "x"}))
                .unwrap();
        assert!(!other.replaces_active());

        let add: Operation = serde_json::from_value(json!({"op": "add", "path": "active"}))
            .unwrap();
        assert!(!add.replaces_active());
    }

    #[test]
    fn test_create_response_field_name() {
        let body = serde_json::to_value(CreateUserResponse {
            user_url: "http://smc/ldap/1".to_string(),
        })
        .unwrap();
        assert_eq!(body, json!({"userUrl": "http://smc/ldap/1"}));
    }
}
