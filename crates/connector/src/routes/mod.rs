//! HTTP route handlers for the inbound API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                   - Health check
//!
//! # Administrators
//! GET    /api/v1/Users             - List administrators (optionally ?id=)
//! POST   /api/v1/CreateUsers       - Create an administrator
//! POST   /api/v1/UpdateUsers       - Patch the enabled state
//! DELETE /api/v1/Users/{id}        - Delete an administrator
//!
//! # Discovery and tokens
//! GET    /api/v1/EntryPoints       - Route name to absolute URL
//! POST   /api/v1/TokenPermission   - Decide whether a token may be issued
//! ```
//!
//! Every request that touches the SMC opens and closes its own session.

pub mod token;
pub mod users;

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Named API routes advertised by the entry point listing.
pub const API_ROUTES: [(&str, &str); 6] = [
    ("CreateUser", "/api/v1/CreateUsers"),
    ("UpdateUser", "/api/v1/UpdateUsers"),
    ("GetUsers", "/api/v1/Users"),
    ("DeleteUser", "/api/v1/Users/{id}"),
    ("EntryPoints", "/api/v1/EntryPoints"),
    ("TokenPermission", "/api/v1/TokenPermission"),
];

/// Create the administrator routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/CreateUsers", post(users::create))
        .route("/UpdateUsers", post(users::update))
        .route("/Users", get(users::index))
        .route("/Users/{id}", delete(users::destroy))
        .route("/EntryPoints", get(entry_points))
        .route("/TokenPermission", post(token::permission))
}

/// Create all routes for the connector.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not contact the SMC.
async fn health() -> &'static str {
    "ok"
}

/// Absolute URL of every API route, keyed by route name.
///
/// GET /api/v1/EntryPoints
async fn entry_points(State(state): State<AppState>) -> Json<BTreeMap<&'static str, String>> {
    tracing::info!("Listing API entry points");
    Json(
        API_ROUTES
            .iter()
            .map(|(name, path)| (*name, format!("{}{path}", state.public_url())))
            .collect(),
    )
}
