//! Integration test support for the SMC connector.
//!
//! [`MockSmc`] is an in-process SMC REST API served by axum on an ephemeral
//! port. The connector talks to it with its real `reqwest` client, so tests
//! exercise cookies, entry-point discovery and `If-Match` handling end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p smc-connector-integration-tests
//! ```
//!
//! # Mock behavior
//!
//! - `POST /{version}/login` accepts only [`MOCK_KEY`] and sets a session cookie
//! - every other route answers 401 without an active session cookie
//! - administrator documents carry an `ETag`; writes with a stale
//!   `If-Match` are refused with 412
//! - roles are numbered as on a stock SMC (`Viewer` is role 1)
//! - the LDAP tree has one user domain ([`MOCK_LDAP_DOMAIN`]) with one
//!   organizational unit ([`MOCK_USERS_OU`])

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use smc_connector::smc::{SmcClient, SmcEndpoint};
use tokio::sync::Mutex;

/// API version segment the mock serves under.
pub const MOCK_API_VERSION: &str = "6.7";

/// The only authentication key the mock accepts.
pub const MOCK_KEY: &str = "mock-smc-authentication-key";

/// Name of the external LDAP user domain.
pub const MOCK_LDAP_DOMAIN: &str = "corp.example.com";

/// Organizational unit holding the LDAP users.
pub const MOCK_USERS_OU: &str = "AADDC Users";

/// Role catalog of a stock SMC.
pub const MOCK_ROLES: [(&str, u32); 9] = [
    ("Viewer", 1),
    ("Operator", 2),
    ("Editor", 3),
    ("Owner", 4),
    ("Monitor", 5),
    ("Logs Viewer", 6),
    ("Reports Manager", 7),
    ("NSX Role", 8),
    ("Superuser", 9),
];

#[derive(Debug, Clone)]
struct MockAdmin {
    document: Value,
    version: u32,
}

#[derive(Debug, Clone)]
struct MockLdapUser {
    object_id: String,
    name: String,
}

/// Request and write counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub logins: u32,
    pub logouts: u32,
    pub creates: u32,
    pub updates: u32,
    pub toggles: u32,
    pub deletes: u32,
    pub conflicts: u32,
}

impl Counters {
    /// Writes that changed an administrator.
    #[must_use]
    pub const fn writes(&self) -> u32 {
        self.creates + self.updates + self.toggles + self.deletes
    }
}

#[derive(Debug)]
struct MockState {
    base: String,
    sessions: HashSet<String>,
    next_session: u32,
    admins: BTreeMap<u32, MockAdmin>,
    next_admin: u32,
    ldap_users: Vec<MockLdapUser>,
    counters: Counters,
    // Fault injection
    logout_status: StatusCode,
    roles_available: bool,
    conflict_on_write: HashSet<String>,
    reject_updates: bool,
}

impl MockState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|cookie| self.sessions.contains(cookie))
    }

    fn admin_href(&self, id: u32) -> String {
        format!("{}/elements/admin_user/{id}", self.base)
    }

    fn admin_id(&self, name: &str) -> Option<u32> {
        self.admins
            .iter()
            .find(|(_, a)| a.document["name"] == name)
            .map(|(id, _)| *id)
    }

    /// Check `If-Match` against the stored version, honoring injected
    /// conflicts.
    fn precondition(&mut self, id: u32, headers: &HeaderMap) -> Result<(), StatusCode> {
        let Some(admin) = self.admins.get_mut(&id) else {
            return Err(StatusCode::NOT_FOUND);
        };

        let name = admin.document["name"].as_str().unwrap_or_default().to_owned();
        if self.conflict_on_write.remove(&name) {
            admin.version += 1;
        }

        let expected = etag(id, admin.version);
        let given = headers.get(header::IF_MATCH).and_then(|v| v.to_str().ok());
        if given == Some(expected.as_str()) {
            Ok(())
        } else {
            self.counters.conflicts += 1;
            Err(StatusCode::PRECONDITION_FAILED)
        }
    }
}

fn etag(id: u32, version: u32) -> String {
    format!("\"{id}-{version}\"")
}

type Shared = Arc<Mutex<MockState>>;

/// A running mock SMC.
#[derive(Clone)]
pub struct MockSmc {
    addr: SocketAddr,
    state: Shared,
}

impl MockSmc {
    /// Start a mock SMC on an ephemeral local port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock SMC");
        let addr = listener.local_addr().expect("Mock SMC has no local address");

        let state = Arc::new(Mutex::new(MockState {
            base: format!("http://{addr}/{MOCK_API_VERSION}"),
            sessions: HashSet::new(),
            next_session: 1,
            admins: BTreeMap::new(),
            next_admin: 1,
            ldap_users: Vec::new(),
            counters: Counters::default(),
            logout_status: StatusCode::NO_CONTENT,
            roles_available: true,
            conflict_on_write: HashSet::new(),
            reject_updates: false,
        }));

        let app = router().with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// API base URL, `http://127.0.0.1:<port>/6.7`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/{MOCK_API_VERSION}", self.addr)
    }

    /// Endpoint settings that log in to this mock.
    #[must_use]
    pub fn endpoint(&self) -> SmcEndpoint {
        SmcEndpoint {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            api_version: MOCK_API_VERSION.to_string(),
            login_domain: "Shared Domain".to_string(),
            key: SecretString::from(MOCK_KEY.to_string()),
        }
    }

    /// A connector client pointed at this mock.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> SmcClient {
        SmcClient::new(self.endpoint()).expect("Failed to build SMC client")
    }

    /// Reference of role `index`.
    #[must_use]
    pub fn role_href(&self, index: u32) -> String {
        format!("{}/elements/role/{index}", self.base_url())
    }

    /// Reference of the LDAP user with `object_id`.
    #[must_use]
    pub fn ldap_user_href(&self, object_id: &str) -> String {
        format!("{}/ldap/user/{object_id}", self.base_url())
    }

    /// Add an administrator holding the given role indices.
    ///
    /// Returns the administrator's reference.
    pub async fn add_admin(&self, name: &str, ldap_id: Option<&str>, roles: &[u32]) -> String {
        let scope = smc_connector_core::GrantScope::for_api_base(&self.base_url());
        let permissions: Vec<Value> = roles
            .iter()
            .map(|index| json!(scope.grant(&self.role_href(*index))))
            .collect();
        let ldap_user = ldap_id.map(|id| self.ldap_user_href(id));

        let document = json!({
            "name": name,
            "enabled": true,
            "superuser": roles.contains(&9),
            "is_user_locked": false,
            "ldap_user": ldap_user,
            "auth_method": format!("{}/elements/authentication_service/1", self.base_url()),
            "permissions": {"permission": permissions},
        });

        let mut state = self.state.lock().await;
        let id = state.next_admin;
        state.next_admin += 1;
        state.admins.insert(
            id,
            MockAdmin {
                document,
                version: 1,
            },
        );
        state.admin_href(id)
    }

    /// Add a user to the LDAP organizational unit.
    pub async fn add_ldap_user(&self, name: &str, object_id: &str) {
        self.state.lock().await.ldap_users.push(MockLdapUser {
            object_id: object_id.to_owned(),
            name: name.to_owned(),
        });
    }

    /// Stored document of the administrator called `name`.
    pub async fn admin(&self, name: &str) -> Option<Value> {
        let state = self.state.lock().await;
        let id = state.admin_id(name)?;
        state.admins.get(&id).map(|a| a.document.clone())
    }

    /// Role indices `name` currently holds, sorted.
    pub async fn role_indices(&self, name: &str) -> Vec<u32> {
        let Some(document) = self.admin(name).await else {
            return Vec::new();
        };
        let mut indices: Vec<u32> = document["permissions"]["permission"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|p| p["role_ref"].as_str())
            .filter_map(|href| href.rsplit('/').next())
            .filter_map(|index| index.parse().ok())
            .collect();
        indices.sort_unstable();
        indices
    }

    pub async fn admin_names(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .admins
            .values()
            .filter_map(|a| a.document["name"].as_str().map(str::to_owned))
            .collect()
    }

    pub async fn counters(&self) -> Counters {
        self.state.lock().await.counters
    }

    /// Sessions logged in and not yet logged out.
    pub async fn active_sessions(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Status the logout endpoint answers with.
    pub async fn set_logout_status(&self, status: StatusCode) {
        self.state.lock().await.logout_status = status;
    }

    /// Whether the role listing returns the catalog or an empty list.
    pub async fn set_roles_available(&self, available: bool) {
        self.state.lock().await.roles_available = available;
    }

    /// Simulate a concurrent change to `name` right before the next write.
    pub async fn conflict_on_next_write(&self, name: &str) {
        self.state
            .lock()
            .await
            .conflict_on_write
            .insert(name.to_owned());
    }

    /// Answer every administrator update with 400.
    pub async fn set_reject_updates(&self, reject: bool) {
        self.state.lock().await.reject_updates = reject;
    }
}

fn router() -> Router<Shared> {
    let api = Router::new()
        .route("/login", post(login))
        .route("/api", get(entry_points))
        .route("/logout", put(logout))
        .route(
            "/elements/admin_user",
            get(list_admins).post(create_admin),
        )
        .route(
            "/elements/admin_user/{id}",
            get(read_admin).put(update_admin).delete(delete_admin),
        )
        .route("/elements/admin_user/{id}/enable_disable", put(toggle_admin))
        .route("/elements/role", get(list_roles))
        .route("/elements/authentication_service", get(list_auth_services))
        .route("/elements/external_ldap_user_domain", get(list_user_domains))
        .route(
            "/elements/external_ldap_user_domain/{id}/browse",
            get(browse_domain),
        )
        .route("/ldap/ou/users/browse", get(browse_users))
        .route("/ldap/user/{id}", get(read_ldap_user));

    Router::new().nest(&format!("/{MOCK_API_VERSION}"), api)
}

fn result_list(items: Vec<Value>) -> Response {
    Json(json!({ "result": items })).into_response()
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    state.counters.logins += 1;

    if body["authenticationkey"] != MOCK_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let cookie = format!("JSESSIONID=mock-{}", state.next_session);
    state.next_session += 1;
    state.sessions.insert(cookie.clone());

    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("{cookie}; Path=/; HttpOnly"))],
    )
        .into_response()
}

async fn entry_points(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let base = &state.base;
    let entries: Vec<Value> = [
        ("admin_user", format!("{base}/elements/admin_user")),
        ("role", format!("{base}/elements/role")),
        ("logout", format!("{base}/logout")),
        (
            "authentication_service",
            format!("{base}/elements/authentication_service"),
        ),
        (
            "external_ldap_user_domain",
            format!("{base}/elements/external_ldap_user_domain"),
        ),
    ]
    .into_iter()
    .map(|(rel, href)| json!({"rel": rel, "href": href}))
    .collect();

    Json(json!({ "entry_point": entries })).into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let status = state.logout_status;
    if status == StatusCode::NO_CONTENT {
        if let Some(cookie) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            state.sessions.remove(cookie);
        }
        state.counters.logouts += 1;
    }
    status.into_response()
}

async fn list_admins(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    result_list(
        state
            .admins
            .iter()
            .map(|(id, a)| {
                json!({
                    "name": a.document["name"],
                    "href": state.admin_href(*id),
                    "type": "admin_user",
                })
            })
            .collect(),
    )
}

async fn create_admin(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let mut state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Ok(document) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(name) = document["name"].as_str() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if state.admin_id(name).is_some() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"details": [format!("User name {name} already exists")]})),
        )
            .into_response();
    }

    let id = state.next_admin;
    state.next_admin += 1;
    state.admins.insert(
        id,
        MockAdmin {
            document,
            version: 1,
        },
    );
    state.counters.creates += 1;

    (StatusCode::CREATED, [(header::LOCATION, state.admin_href(id))]).into_response()
}

async fn read_admin(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.admins.get(&id) {
        Some(admin) => (
            [(header::ETAG, etag(id, admin.version))],
            Json(admin.document.clone()),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_admin(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u32>,
    body: Bytes,
) -> Response {
    let mut state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.reject_updates {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"details": ["update rejected"]})),
        )
            .into_response();
    }
    if let Err(status) = state.precondition(id, &headers) {
        return status.into_response();
    }
    let Ok(document) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Some(admin) = state.admins.get_mut(&id) {
        admin.document = document;
        admin.version += 1;
    }
    state.counters.updates += 1;
    StatusCode::OK.into_response()
}

async fn toggle_admin(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Response {
    let mut state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Err(status) = state.precondition(id, &headers) {
        return status.into_response();
    }

    if let Some(admin) = state.admins.get_mut(&id) {
        let enabled = admin.document["enabled"].as_bool().unwrap_or(false);
        admin.document["enabled"] = json!(!enabled);
        admin.version += 1;
    }
    state.counters.toggles += 1;
    StatusCode::OK.into_response()
}

async fn delete_admin(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Response {
    let mut state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Err(status) = state.precondition(id, &headers) {
        return status.into_response();
    }

    state.admins.remove(&id);
    state.counters.deletes += 1;
    StatusCode::NO_CONTENT.into_response()
}

async fn list_roles(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !state.roles_available {
        return result_list(Vec::new());
    }

    result_list(
        MOCK_ROLES
            .iter()
            .map(|(name, index)| {
                json!({
                    "name": name,
                    "href": format!("{}/elements/role/{index}", state.base),
                    "type": "role",
                })
            })
            .collect(),
    )
}

async fn list_auth_services(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    result_list(vec![
        json!({
            "name": "Network Policy Server",
            "href": format!("{}/elements/authentication_service/2", state.base),
        }),
        json!({
            "name": "LDAP Authentication",
            "href": format!("{}/elements/authentication_service/1", state.base),
        }),
    ])
}

async fn list_user_domains(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    result_list(vec![json!({
        "name": MOCK_LDAP_DOMAIN,
        "href": format!("{}/elements/external_ldap_user_domain/1", state.base),
        "type": "external_ldap_user_domain",
    })])
}

async fn browse_domain(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id != 1 {
        return StatusCode::NOT_FOUND.into_response();
    }

    result_list(vec![
        json!({
            "name": "Domain Controllers",
            "href": format!("{}/ldap/ou/controllers", state.base),
            "type": "ldap_ou",
        }),
        json!({
            "name": MOCK_USERS_OU,
            "href": format!("{}/ldap/ou/users", state.base),
            "type": "ldap_ou",
        }),
    ])
}

async fn browse_users(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut items: Vec<Value> = state
        .ldap_users
        .iter()
        .map(|u| {
            json!({
                "name": format!("CN={}", u.name),
                "href": format!("{}/ldap/user/{}", state.base, u.object_id),
                "type": "external_ldap_user",
            })
        })
        .collect();
    items.push(json!({
        "name": "CN=Service Accounts",
        "href": format!("{}/ldap/ou/service", state.base),
        "type": "ldap_ou",
    }));
    result_list(items)
}

async fn read_ldap_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let state = state.lock().await;
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(user) = state.ldap_users.iter().find(|u| u.object_id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let href = format!("{}/ldap/user/{}", state.base, user.object_id);

    Json(json!({
        "name": user.name,
        "display_name": user.name,
        "unique_id": user.object_id,
        "link": [
            {"rel": "self", "href": href},
            {"rel": "browse", "href": format!("{href}/browse")},
        ],
    }))
    .into_response()
}
