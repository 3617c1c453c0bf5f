//! Single-administrator provisioning against the mock SMC.
//!
//! Run with: cargo test -p smc-connector-integration-tests --test provisioning

#![allow(clippy::unwrap_used)]

use smc_connector::provisioning::{ProvisionError, Provisioner, RoleDefaults};
use smc_connector::smc::SmcError;
use smc_connector_core::SmcRole;
use smc_connector_integration_tests::{MOCK_LDAP_DOMAIN, MOCK_USERS_OU, MockSmc};

fn provisioner(smc: &MockSmc, defaults: RoleDefaults) -> Provisioner {
    Provisioner::new(
        smc.client(),
        defaults,
        MOCK_LDAP_DOMAIN.to_string(),
        MOCK_USERS_OU.to_string(),
    )
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_binds_ldap_user_with_default_roles() {
    let smc = MockSmc::start().await;
    smc.add_ldap_user("jdoe", "obj-jdoe").await;

    let created = provisioner(&smc, RoleDefaults::default())
        .create_administrator("jdoe@corp.example.com", true)
        .await
        .expect("creation should succeed");

    assert_eq!(created.name, "jdoe");
    assert_eq!(created.ldap_user, smc.ldap_user_href("obj-jdoe"));

    let stored = smc.admin("jdoe").await.unwrap();
    assert_eq!(stored["enabled"], true);
    assert_eq!(stored["superuser"], false);
    assert_eq!(stored["allowed_to_login_in_shared"], true);
    assert_eq!(
        stored["auth_method"],
        format!("{}/elements/authentication_service/1", smc.base_url())
    );
    assert_eq!(smc.role_indices("jdoe").await, vec![1]);
    assert_eq!(smc.active_sessions().await, 0);
}

#[tokio::test]
async fn test_create_with_superuser_default() {
    let smc = MockSmc::start().await;
    smc.add_ldap_user("root", "obj-root").await;

    let defaults = RoleDefaults {
        roles: vec![SmcRole::Viewer, SmcRole::Owner, SmcRole::Superuser],
        console_superuser: true,
        ..RoleDefaults::default()
    };
    provisioner(&smc, defaults)
        .create_administrator("root@corp.example.com", false)
        .await
        .unwrap();

    let stored = smc.admin("root").await.unwrap();
    assert_eq!(stored["enabled"], false);
    assert_eq!(stored["superuser"], true);
    assert_eq!(stored["console_superuser"], true);
    assert_eq!(smc.role_indices("root").await, vec![9]);
}

#[tokio::test]
async fn test_create_existing_administrator_is_rejected() {
    let smc = MockSmc::start().await;
    smc.add_ldap_user("jdoe", "obj-jdoe").await;
    smc.add_admin("jdoe", Some("obj-jdoe"), &[1]).await;

    let result = provisioner(&smc, RoleDefaults::default())
        .create_administrator("jdoe@corp.example.com", true)
        .await;

    assert!(matches!(result, Err(ProvisionError::AlreadyExists(name)) if name == "jdoe"));
    assert_eq!(smc.active_sessions().await, 0);
}

#[tokio::test]
async fn test_create_unknown_ldap_user() {
    let smc = MockSmc::start().await;
    smc.add_ldap_user("someone", "obj-1").await;

    let result = provisioner(&smc, RoleDefaults::default())
        .create_administrator("ghost@corp.example.com", true)
        .await;

    assert!(matches!(result, Err(ProvisionError::LdapUserNotFound(_))));
    assert_eq!(smc.counters().await.creates, 0);
}

#[tokio::test]
async fn test_create_rejects_malformed_login_before_login() {
    let smc = MockSmc::start().await;

    let result = provisioner(&smc, RoleDefaults::default())
        .create_administrator("jdoe", true)
        .await;

    assert!(matches!(result, Err(ProvisionError::InvalidLoginName(_))));
    assert_eq!(smc.counters().await.logins, 0);
}

// ============================================================================
// Enable / Disable
// ============================================================================

#[tokio::test]
async fn test_enable_disable_toggles() {
    let smc = MockSmc::start().await;
    smc.add_admin("jdoe", Some("obj-jdoe"), &[1]).await;
    let gateway = provisioner(&smc, RoleDefaults::default());

    gateway.enable_disable_user("jdoe").await.unwrap();
    assert_eq!(smc.admin("jdoe").await.unwrap()["enabled"], false);

    gateway.enable_disable_user("obj-jdoe").await.unwrap();
    assert_eq!(smc.admin("jdoe").await.unwrap()["enabled"], true);
    assert_eq!(smc.counters().await.toggles, 2);
}

#[tokio::test]
async fn test_set_enabled_only_writes_on_change() {
    let smc = MockSmc::start().await;
    smc.add_admin("jdoe", None, &[1]).await;
    let gateway = provisioner(&smc, RoleDefaults::default());

    assert!(gateway.set_enabled("jdoe", false).await.unwrap());
    assert!(!gateway.set_enabled("jdoe@corp.example.com", false).await.unwrap());

    assert_eq!(smc.admin("jdoe").await.unwrap()["enabled"], false);
    assert_eq!(smc.counters().await.toggles, 1);
}

#[tokio::test]
async fn test_toggle_unknown_administrator() {
    let smc = MockSmc::start().await;
    smc.add_admin("admin", None, &[9]).await;

    let result = provisioner(&smc, RoleDefaults::default())
        .enable_disable_user("nobody")
        .await;

    assert!(matches!(
        result,
        Err(ProvisionError::Smc(SmcError::NotFound(_)))
    ));
    assert_eq!(smc.active_sessions().await, 0);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_administrator() {
    let smc = MockSmc::start().await;
    smc.add_admin("admin", None, &[9]).await;
    smc.add_admin("jdoe", Some("obj-jdoe"), &[1]).await;

    provisioner(&smc, RoleDefaults::default())
        .delete_administrator("obj-jdoe")
        .await
        .unwrap();

    assert_eq!(smc.admin_names().await, vec!["admin".to_string()]);
}

#[tokio::test]
async fn test_delete_ambiguous_administrator_deletes_nothing() {
    let smc = MockSmc::start().await;
    smc.add_admin("jdoe", Some("dup"), &[1]).await;
    smc.add_admin("jdoe2", Some("dup"), &[1]).await;

    let result = provisioner(&smc, RoleDefaults::default())
        .delete_administrator("dup")
        .await;

    assert!(matches!(
        result,
        Err(ProvisionError::Smc(SmcError::AmbiguousMatch(_)))
    ));
    assert_eq!(smc.counters().await.deletes, 0);
}
