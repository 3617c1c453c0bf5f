//! Reconciliation cycles against the mock SMC and an in-memory directory.
//!
//! Run with: cargo test -p smc-connector-integration-tests --test reconcile

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use smc_connector::directory::{InMemoryDirectory, InMemoryDirectoryBuilder};
use smc_connector::reconcile::{ReconcileSettings, Reconciler};
use smc_connector::smc::{SmcClient, SmcEndpoint};
use smc_connector_integration_tests::MockSmc;
use tokio::sync::watch;

const APP: &str = "smc-connector";

fn settings() -> ReconcileSettings {
    ReconcileSettings {
        interval: Duration::from_millis(50),
        role_retry_backoff: Duration::from_millis(10),
        write_pause: Duration::ZERO,
        ..ReconcileSettings::new(APP)
    }
}

/// Directory where every listed user exists and is assigned to the app.
fn directory(users: &[&str]) -> InMemoryDirectoryBuilder {
    users.iter().fold(InMemoryDirectory::builder(), |dir, user| {
        dir.with_user(user)
            .with_app_assignment(APP, &format!("id-{user}"), user)
    })
}

// ============================================================================
// Role Reconciliation
// ============================================================================

#[tokio::test]
async fn test_cycle_applies_group_roles_then_is_idempotent() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;
    smc.add_admin("bob", None, &[1]).await;

    let dir = directory(&["alice", "bob"])
        .with_group("Editor", &["alice"])
        .with_group("Operator", &["alice", "bob"])
        .build();
    let reconciler = Reconciler::new(smc.client(), dir, settings());

    let first = reconciler.run_cycle().await;
    assert_eq!(first.aborted, None);
    assert_eq!(first.updated, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(smc.role_indices("alice").await, vec![2, 3]);
    assert_eq!(smc.role_indices("bob").await, vec![2]);

    let writes = smc.counters().await.writes();
    let second = reconciler.run_cycle().await;
    assert!(second.updated.is_empty());
    assert_eq!(second.unchanged, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(smc.counters().await.writes(), writes);

    // Every cycle logs out
    assert_eq!(smc.active_sessions().await, 0);
}

#[tokio::test]
async fn test_superuser_replaces_every_other_role() {
    let smc = MockSmc::start().await;
    smc.add_admin("carol", None, &[3]).await;

    let dir = directory(&["carol"])
        .with_group("Editor", &["carol"])
        .with_group("Superuser", &["carol"])
        .with_group("Viewer", &["carol"])
        .build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert_eq!(report.updated, vec!["carol".to_string()]);
    assert_eq!(smc.role_indices("carol").await, vec![9]);
    assert_eq!(smc.admin("carol").await.unwrap()["superuser"], true);
}

#[tokio::test]
async fn test_baseline_role_with_no_stored_permissions_is_converged() {
    let smc = MockSmc::start().await;
    smc.add_admin("dave", None, &[]).await;

    let dir = directory(&["dave"]).with_group("Viewer", &["dave"]).build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert_eq!(report.unchanged, vec!["dave".to_string()]);
    assert_eq!(smc.counters().await.updates, 0);
}

#[tokio::test]
async fn test_admins_outside_every_group_are_untouched() {
    let smc = MockSmc::start().await;
    smc.add_admin("erin", None, &[4]).await;
    smc.add_admin("frank", None, &[1]).await;

    let dir = directory(&["erin", "frank"]).with_group("Operator", &["frank"]).build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert_eq!(report.updated, vec!["frank".to_string()]);
    assert_eq!(smc.role_indices("erin").await, vec![4]);
}

#[tokio::test]
async fn test_failed_group_lookup_skips_that_role() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;

    let dir = directory(&["alice"])
        .with_group("Editor", &["alice"])
        .with_group("Operator", &["alice"])
        .build();
    dir.fail_group("Editor").await;

    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert_eq!(report.aborted, None);
    assert_eq!(smc.role_indices("alice").await, vec![2]);
}

#[tokio::test]
async fn test_concurrent_change_fails_user_then_converges() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;
    smc.add_admin("bob", None, &[1]).await;
    smc.conflict_on_next_write("alice").await;

    let dir = directory(&["alice", "bob"]).with_group("Owner", &["alice", "bob"]).build();
    let reconciler = Reconciler::new(smc.client(), dir, settings());

    let first = reconciler.run_cycle().await;
    assert_eq!(first.failed, vec!["alice".to_string()]);
    assert_eq!(first.updated, vec!["bob".to_string()]);
    assert_eq!(smc.counters().await.conflicts, 1);
    assert_eq!(smc.role_indices("alice").await, vec![1]);

    let second = reconciler.run_cycle().await;
    assert_eq!(second.updated, vec!["alice".to_string()]);
    assert_eq!(smc.role_indices("alice").await, vec![4]);
}

#[tokio::test]
async fn test_rejected_update_is_reported_per_user() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;
    smc.set_reject_updates(true).await;

    let dir = directory(&["alice"]).with_group("Editor", &["alice"]).build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert_eq!(report.aborted, None);
    assert_eq!(report.failed, vec!["alice".to_string()]);
    assert_eq!(smc.active_sessions().await, 0);
}

#[tokio::test]
async fn test_rejected_updates_still_pause_between_writes() {
    let smc = MockSmc::start().await;
    for name in ["a", "b", "c"] {
        smc.add_admin(name, None, &[1]).await;
    }
    smc.set_reject_updates(true).await;

    let dir = directory(&["a", "b", "c"]).with_group("Editor", &["a", "b", "c"]).build();
    let pause = Duration::from_millis(100);
    let reconciler = Reconciler::new(
        smc.client(),
        dir,
        ReconcileSettings {
            write_pause: pause,
            ..settings()
        },
    );

    let started = tokio::time::Instant::now();
    let report = reconciler.run_cycle().await;

    assert_eq!(report.failed.len(), 3);
    assert!(started.elapsed() >= pause * 3);
}

// ============================================================================
// Aborted Cycles
// ============================================================================

#[tokio::test]
async fn test_empty_role_catalog_aborts_after_retry() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;
    smc.set_roles_available(false).await;

    let dir = directory(&["alice"]).with_group("Editor", &["alice"]).build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert!(report.aborted.is_some());
    assert_eq!(smc.counters().await.updates, 0);
    assert_eq!(smc.active_sessions().await, 0);
}

#[tokio::test]
async fn test_login_failure_aborts_cycle() {
    let smc = MockSmc::start().await;
    let endpoint = SmcEndpoint {
        key: SecretString::from("wrong".to_string()),
        ..smc.endpoint()
    };

    let report = Reconciler::new(
        SmcClient::new(endpoint).unwrap(),
        directory(&[]).build(),
        settings(),
    )
    .run_cycle()
    .await;

    assert!(report.aborted.as_deref().unwrap().contains("login"));
    assert_eq!(report.writes(), 0);
}

// ============================================================================
// Deprovisioning
// ============================================================================

#[tokio::test]
async fn test_deprovisions_directory_users_without_assignment() {
    let smc = MockSmc::start().await;
    for name in ["A", "B", "C", "admin"] {
        smc.add_admin(name, None, &[1]).await;
    }

    let dir = InMemoryDirectory::builder()
        .with_user("A")
        .with_user("B")
        .with_user("C")
        .with_user("D")
        .with_app_assignment(APP, "id-A", "A")
        .build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert_eq!(report.deprovisioned, vec!["B".to_string(), "C".to_string()]);
    assert_eq!(report.deprovision_aborted, None);
    // Local accounts are never touched
    assert_eq!(smc.admin_names().await, vec!["A".to_string(), "admin".to_string()]);
}

#[tokio::test]
async fn test_unassigned_user_is_removed_on_next_cycle() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;
    smc.add_admin("bob", None, &[1]).await;

    let dir = directory(&["alice", "bob"]).build();
    let reconciler = Reconciler::new(smc.client(), dir.clone(), settings());

    assert!(reconciler.run_cycle().await.deprovisioned.is_empty());

    dir.unassign(APP, "id-bob").await;
    let report = reconciler.run_cycle().await;
    assert_eq!(report.deprovisioned, vec!["bob".to_string()]);
    assert_eq!(smc.admin_names().await, vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_no_assignments_deletes_nothing() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;

    let dir = directory(&["alice"]).build();
    dir.unassign(APP, "id-alice").await;

    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert!(report.deprovision_aborted.is_some());
    assert!(report.deprovisioned.is_empty());
    assert_eq!(smc.counters().await.deletes, 0);
}

#[tokio::test]
async fn test_unknown_application_deletes_nothing() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;

    let dir = InMemoryDirectory::builder().with_user("alice").build();
    let report = Reconciler::new(smc.client(), dir, settings())
        .run_cycle()
        .await;

    assert!(report.deprovision_aborted.unwrap().contains(APP));
    assert_eq!(smc.counters().await.deletes, 0);
}

// ============================================================================
// Loop Lifecycle
// ============================================================================

#[tokio::test]
async fn test_loop_runs_cycles_until_shutdown() {
    let smc = MockSmc::start().await;
    smc.add_admin("alice", None, &[1]).await;

    let dir = directory(&["alice"]).with_group("Owner", &["alice"]).build();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = Reconciler::new(smc.client(), dir, settings()).spawn(shutdown_rx);

    tokio::time::timeout(Duration::from_secs(5), async {
        while smc.role_indices("alice").await != vec![4] {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("loop should converge alice");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop should stop after shutdown")
        .unwrap();
}
