//! Integration tests for the dbpanel-core crate.
//!
//! Every test opens a fresh panel in a temporary data directory and drives
//! it only through the public `Panel` API.

use chrono::Duration;
use dbpanel_core::{Panel, PanelConfig, PanelError, TokenRejection};
use futures::future::join_all;

async fn open_panel() -> (tempfile::TempDir, Panel) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PanelConfig::with_data_dir(dir.path());
    config.pbkdf2_iterations = 1_000;
    let panel = Panel::open(config).await.unwrap();
    (dir, panel)
}

fn audit_actions(entries: &[dbpanel_core::AuditEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.action.as_str()).collect()
}

fn rejection<T: std::fmt::Debug>(result: Result<T, PanelError>) -> TokenRejection {
    match result {
        Err(PanelError::InvalidToken(reason)) => reason,
        other => panic!("expected InvalidToken, got {other:?}"),
    }
}

#[tokio::test]
async fn tenant_lifecycle_end_to_end() {
    let (_dir, panel) = open_panel().await;

    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();
    let listed = panel.list_databases().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].db_name, "tenant_one");
    assert_eq!(listed[0].user, "tenant_user");

    panel
        .rotate_password("tenant_one", "newpassword123")
        .await
        .unwrap();
    assert!(
        panel
            .verify_credential("tenant_one", "newpassword123")
            .await
            .unwrap()
    );

    let issued = panel.issue_inspection_token("tenant_one").await.unwrap();
    assert_eq!(issued.token.len(), 43);

    let inspection = panel.redeem_inspection_token(&issued.token).await.unwrap();
    assert_eq!(inspection.db_name, "tenant_one");
    assert!(inspection.tables.is_empty());

    assert_eq!(
        rejection(panel.redeem_inspection_token(&issued.token).await),
        TokenRejection::AlreadyUsed
    );

    panel.delete_database("tenant_one").await.unwrap();
    assert!(panel.list_databases().await.unwrap().is_empty());

    let entries = panel.list_audit_log(None).await.unwrap();
    assert_eq!(
        audit_actions(&entries),
        vec!["delete", "redeem_token", "issue_token", "rotate", "create"]
    );
    assert!(entries.iter().all(|e| e.db_name == "tenant_one"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_one_name_have_a_single_winner() {
    let (_dir, panel) = open_panel().await;

    let attempts = (0..8).map(|i| {
        let panel = panel.clone();
        tokio::spawn(async move {
            panel
                .create_database("contended", &format!("user_{i}"), "supersafe123")
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(PanelError::AlreadyExists { .. })))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, 7);

    assert_eq!(panel.list_databases().await.unwrap().len(), 1);
    let creates = panel
        .list_audit_log(None)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == "create")
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redeems_of_one_token_have_a_single_winner() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();
    let issued = panel.issue_inspection_token("tenant_one").await.unwrap();

    let attempts = (0..8).map(|_| {
        let panel = panel.clone();
        let token = issued.token.clone();
        tokio::spawn(async move { panel.redeem_inspection_token(&token).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.into_iter().filter(Result::is_err) {
        assert_eq!(rejection(result), TokenRejection::AlreadyUsed);
    }
}

#[tokio::test]
async fn zero_lifetime_token_never_validates() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();
    let issued = panel
        .issue_inspection_token_with_ttl("tenant_one", Duration::zero())
        .await
        .unwrap();
    assert_eq!(
        rejection(panel.redeem_inspection_token(&issued.token).await),
        TokenRejection::Expired
    );
}

#[tokio::test]
async fn deleting_a_database_revokes_its_tokens() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();
    let first = panel.issue_inspection_token("tenant_one").await.unwrap();
    let second = panel.issue_inspection_token("tenant_one").await.unwrap();

    panel.delete_database("tenant_one").await.unwrap();

    for token in [&first.token, &second.token] {
        assert_eq!(
            rejection(panel.redeem_inspection_token(token).await),
            TokenRejection::NotFound
        );
    }
}

#[tokio::test]
async fn name_is_reusable_after_delete() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "first_user", "supersafe123")
        .await
        .unwrap();
    panel.delete_database("tenant_one").await.unwrap();

    let again = panel
        .create_database("tenant_one", "second_user", "anotherpass1")
        .await
        .unwrap();
    assert_eq!(again.user, "second_user");
    assert!(
        panel
            .verify_credential("tenant_one", "anotherpass1")
            .await
            .unwrap()
    );
    assert!(
        !panel
            .verify_credential("tenant_one", "supersafe123")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn failed_operations_leave_no_audit_trace() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();

    assert!(matches!(
        panel
            .create_database("tenant_one", "tenant_user", "supersafe123")
            .await,
        Err(PanelError::AlreadyExists { .. })
    ));
    assert!(matches!(
        panel.delete_database("ghost_db").await,
        Err(PanelError::NotFound { .. })
    ));
    assert!(matches!(
        panel.rotate_password("ghost_db", "supersafe123").await,
        Err(PanelError::NotFound { .. })
    ));
    assert!(matches!(
        panel.issue_inspection_token("ghost_db").await,
        Err(PanelError::NotFound { .. })
    ));
    assert!(panel.redeem_inspection_token("bogus").await.is_err());

    let entries = panel.list_audit_log(None).await.unwrap();
    assert_eq!(audit_actions(&entries), vec!["create"]);
}

#[tokio::test]
async fn rotation_leaves_the_artifact_untouched() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();
    let path = panel.registry().artifact_path("tenant_one").await.unwrap();
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE invoices (id INTEGER PRIMARY KEY);")
            .unwrap();
    }
    let before = std::fs::read(&path).unwrap();

    panel
        .rotate_password("tenant_one", "newpassword123")
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let issued = panel.issue_inspection_token("tenant_one").await.unwrap();
    let inspection = panel.redeem_inspection_token(&issued.token).await.unwrap();
    assert_eq!(inspection.tables, vec!["invoices"]);
}

#[tokio::test]
async fn listing_is_newest_first() {
    let (_dir, panel) = open_panel().await;
    for name in ["alpha_db", "beta_db", "gamma_db"] {
        panel
            .create_database(name, "tenant_user", "supersafe123")
            .await
            .unwrap();
    }
    let names: Vec<String> = panel
        .list_databases()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.db_name)
        .collect();
    assert_eq!(names, vec!["gamma_db", "beta_db", "alpha_db"]);
}

#[tokio::test]
async fn reconcile_reports_and_repairs_drift() {
    let (dir, panel) = open_panel().await;
    panel
        .create_database("kept_db", "tenant_user", "supersafe123")
        .await
        .unwrap();
    panel
        .create_database("lost_db", "tenant_user", "supersafe123")
        .await
        .unwrap();

    let managed = dir.path().join("managed_dbs");
    std::fs::remove_file(managed.join("lost_db.db")).unwrap();
    std::fs::write(managed.join("stray_db.db"), b"").unwrap();

    // The orphan blocks re-use of its name until reconciled.
    assert!(matches!(
        panel
            .create_database("stray_db", "tenant_user", "supersafe123")
            .await,
        Err(PanelError::ArtifactUnavailable { .. })
    ));

    let report = panel.reconcile().await.unwrap();
    assert_eq!(report.missing_artifacts, vec!["lost_db"]);
    assert_eq!(report.orphaned_artifacts, vec!["stray_db"]);
    assert_eq!(report.removed_orphans, 1);
    assert!(!managed.join("stray_db.db").exists());

    panel
        .create_database("stray_db", "tenant_user", "supersafe123")
        .await
        .unwrap();

    let again = panel.reconcile().await.unwrap();
    assert_eq!(again.missing_artifacts, vec!["lost_db"]);
    assert!(again.orphaned_artifacts.is_empty());
}

#[tokio::test]
async fn purge_reclaims_spent_tokens_only() {
    let (_dir, panel) = open_panel().await;
    panel
        .create_database("tenant_one", "tenant_user", "supersafe123")
        .await
        .unwrap();
    let spent = panel.issue_inspection_token("tenant_one").await.unwrap();
    panel.redeem_inspection_token(&spent.token).await.unwrap();
    let live = panel.issue_inspection_token("tenant_one").await.unwrap();

    assert_eq!(panel.purge_expired_tokens().await.unwrap(), 1);
    assert!(panel.redeem_inspection_token(&live.token).await.is_ok());
}
