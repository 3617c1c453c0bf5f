//! Session bracketing and resource access against the mock SMC.
//!
//! Run with: cargo test -p smc-connector-integration-tests --test session

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use secrecy::SecretString;
use smc_connector::smc::{IdentityMirror, ResourceKind, SmcClient, SmcError, SmcEndpoint};
use smc_connector_integration_tests::MockSmc;

// ============================================================================
// Login / Logout
// ============================================================================

#[tokio::test]
async fn test_login_discovers_entry_points_and_logout_ends_session() {
    let smc = MockSmc::start().await;

    let mut session = smc.client().login().await.expect("login should succeed");
    assert!(session.is_active());
    assert_eq!(
        session.entry_point(ResourceKind::AdminUser).unwrap(),
        format!("{}/elements/admin_user", smc.base_url())
    );
    assert_eq!(smc.active_sessions().await, 1);

    session.logout().await.expect("logout should succeed");
    assert!(!session.is_active());
    assert!(session.entry_points().is_empty());
    assert_eq!(smc.active_sessions().await, 0);

    let counters = smc.counters().await;
    assert_eq!(counters.logins, 1);
    assert_eq!(counters.logouts, 1);
}

#[tokio::test]
async fn test_login_is_idempotent_while_active() {
    let smc = MockSmc::start().await;

    let mut session = smc.client().session();
    session.login().await.unwrap();
    session.login().await.unwrap();
    assert_eq!(smc.counters().await.logins, 1);

    session.release().await;
}

#[tokio::test]
async fn test_wrong_key_is_an_auth_error() {
    let smc = MockSmc::start().await;
    let endpoint = SmcEndpoint {
        key: SecretString::from("not-the-key".to_string()),
        ..smc.endpoint()
    };

    let result = SmcClient::new(endpoint).unwrap().login().await;
    assert!(matches!(result, Err(SmcError::Auth(_))));
    assert_eq!(smc.active_sessions().await, 0);
}

#[tokio::test]
async fn test_logout_other_than_no_content_keeps_session() {
    let smc = MockSmc::start().await;
    smc.set_logout_status(StatusCode::INTERNAL_SERVER_ERROR).await;

    let mut session = smc.client().login().await.unwrap();
    let result = session.logout().await;

    assert!(matches!(
        result,
        Err(SmcError::UnexpectedStatus { status: 500, .. })
    ));
    assert!(session.is_active());
}

#[tokio::test]
async fn test_requests_need_an_active_session() {
    let smc = MockSmc::start().await;
    let session = smc.client().session();

    let result = session
        .get(&format!("{}/elements/admin_user", smc.base_url()))
        .await;
    assert!(matches!(result, Err(SmcError::Session)));
    assert!(matches!(
        session.entry_point(ResourceKind::Role),
        Err(SmcError::Session)
    ));
}

#[tokio::test]
async fn test_logout_then_login_again_restores_access() {
    let smc = MockSmc::start().await;
    let url = format!("{}/elements/admin_user", smc.base_url());

    let mut session = smc.client().login().await.unwrap();
    let discovered = session.entry_points().len();
    session.logout().await.unwrap();

    assert!(matches!(session.get(&url).await, Err(SmcError::Session)));
    assert!(matches!(
        session.entry_point(ResourceKind::AdminUser),
        Err(SmcError::Session)
    ));

    session.login().await.unwrap();
    assert_eq!(session.entry_points().len(), discovered);
    assert_eq!(session.entry_point(ResourceKind::AdminUser).unwrap(), url);
    assert_eq!(session.get(&url).await.unwrap().status(), StatusCode::OK);

    session.release().await;
    let counters = smc.counters().await;
    assert_eq!(counters.logins, 2);
    assert_eq!(counters.logouts, 2);
}

// ============================================================================
// Conditional Updates
// ============================================================================

#[tokio::test]
async fn test_conditional_update_sends_current_etag() {
    let smc = MockSmc::start().await;
    let href = smc.add_admin("alice", Some("obj-alice"), &[1]).await;

    let mut session = smc.client().login().await.unwrap();
    let mut admin = IdentityMirror::new(&session)
        .administrator(&href)
        .await
        .unwrap();
    admin.record.enabled = false;

    let response = session.conditional_update(&href, &admin.record).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session.release().await;

    let stored = smc.admin("alice").await.unwrap();
    assert_eq!(stored["enabled"], false);
    // Unknown fields survive the round trip
    assert!(stored["auth_method"].is_string());
}

#[tokio::test]
async fn test_conditional_update_loses_to_concurrent_change() {
    let smc = MockSmc::start().await;
    let href = smc.add_admin("alice", None, &[1]).await;
    smc.conflict_on_next_write("alice").await;

    let mut session = smc.client().login().await.unwrap();
    let admin = IdentityMirror::new(&session)
        .administrator(&href)
        .await
        .unwrap();

    let response = session.conditional_update(&href, &admin.record).await.unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(smc.counters().await.updates, 0);
    session.release().await;
}

#[tokio::test]
async fn test_stale_etag_is_refused() {
    let smc = MockSmc::start().await;
    let href = smc.add_admin("alice", None, &[1]).await;

    let mut session = smc.client().login().await.unwrap();
    let mirror = IdentityMirror::new(&session);
    let stale = mirror.administrator(&href).await.unwrap();

    // Someone else writes first
    session
        .conditional_update(&href, &stale.record)
        .await
        .unwrap();

    let response = session
        .put_json(&href, Some(&stale.record), stale.etag.as_deref())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    session.release().await;
}

// ============================================================================
// Identity Mirror
// ============================================================================

#[tokio::test]
async fn test_find_administrator_by_name_email_or_directory_id() {
    let smc = MockSmc::start().await;
    smc.add_admin("admin", None, &[9]).await;
    smc.add_admin("jdoe", Some("0f8f-jdoe"), &[1]).await;

    let mut session = smc.client().login().await.unwrap();
    let mirror = IdentityMirror::new(&session);

    for query in ["jdoe", "jdoe@corp.example.com", "0f8f-jdoe"] {
        let admin = mirror.find_administrator(query).await.unwrap();
        assert_eq!(admin.name(), "jdoe", "query {query}");
        assert_eq!(admin.ldap_user_id(), Some("0f8f-jdoe"));
        assert!(admin.etag.is_some());
    }

    assert!(matches!(
        mirror.find_administrator("nobody").await,
        Err(SmcError::NotFound(_))
    ));
    session.release().await;
}

#[tokio::test]
async fn test_find_administrator_rejects_ambiguous_matches() {
    let smc = MockSmc::start().await;
    smc.add_admin("jdoe", Some("shared-id"), &[1]).await;
    smc.add_admin("jdoe2", Some("shared-id"), &[1]).await;

    let mut session = smc.client().login().await.unwrap();
    let result = IdentityMirror::new(&session)
        .find_administrator("shared-id")
        .await;
    assert!(matches!(result, Err(SmcError::AmbiguousMatch(_))));
    session.release().await;
}

#[tokio::test]
async fn test_list_roles() {
    let smc = MockSmc::start().await;

    let mut session = smc.client().login().await.unwrap();
    let catalog = IdentityMirror::new(&session).list_roles().await.unwrap();
    session.release().await;

    assert_eq!(catalog.len(), 9);
    assert_eq!(catalog.get("Viewer"), Some(smc.role_href(1).as_str()));
    assert_eq!(catalog.get("NSX Role"), Some(smc.role_href(8).as_str()));
}
