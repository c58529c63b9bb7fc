//! Dunning regeneration tests against the explicit admin trigger.

mod common;

use common::{TestApp, TEST_ADMIN_ID};
use uuid::Uuid;

async fn regenerate(app: &TestApp, domain: &str) -> serde_json::Value {
    let response = app
        .client
        .post(format!(
            "{}/admin/servers/{}/announcements/regenerate",
            app.address, domain
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

async fn billing_kinds(app: &TestApp, server_id: Uuid) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT kind FROM announcements WHERE server_id = $1 AND status = 'active' ORDER BY kind",
    )
    .bind(server_id)
    .fetch_all(app.db.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn overdue_within_grace_creates_overdue_announcement() {
    let Some(app) = TestApp::spawn().await else { return };

    let server = app.seed_server("cafesublime.mx", 5).await;
    // Issued 8 days ago: due 3 days ago, still inside the 5-day grace period.
    app.seed_invoice("cafesublime.mx", "F-1001", -8, 100000).await;

    let flags = regenerate(&app, "cafesublime.mx").await;
    assert_eq!(flags["due_soon"], false);
    assert_eq!(flags["overdue"], true);
    assert_eq!(flags["suspend"], false);

    assert_eq!(billing_kinds(&app, server.server_id).await, vec!["overdue"]);

    app.cleanup().await;
}

#[tokio::test]
async fn suspension_suppresses_the_overdue_announcement() {
    let Some(app) = TestApp::spawn().await else { return };

    let server = app.seed_server("cafesublime.mx", 5).await;
    // One invoice overdue by 3 days, another overdue by 8.
    app.seed_invoice("cafesublime.mx", "F-2001", -8, 100000).await;
    app.seed_invoice("cafesublime.mx", "F-2002", -13, 100000).await;

    let flags = regenerate(&app, "cafesublime.mx").await;
    assert_eq!(flags["overdue"], true);
    assert_eq!(flags["suspend"], true);

    // Only the suspension is shown; the overdue notice is suppressed.
    assert_eq!(billing_kinds(&app, server.server_id).await, vec!["suspended"]);

    let window: i64 = sqlx::query_scalar(
        "SELECT EXTRACT(DAY FROM ends_at - starts_at)::BIGINT FROM announcements \
         WHERE server_id = $1 AND kind = 'suspended'",
    )
    .bind(server.server_id)
    .fetch_one(app.db.pool())
    .await
    .unwrap();
    assert_eq!(window, 30);

    app.cleanup().await;
}

#[tokio::test]
async fn regeneration_is_idempotent() {
    let Some(app) = TestApp::spawn().await else { return };

    let server = app.seed_server("cafesublime.mx", 5).await;
    app.seed_invoice("cafesublime.mx", "F-3001", -13, 100000).await;

    regenerate(&app, "cafesublime.mx").await;
    regenerate(&app, "cafesublime.mx").await;
    regenerate(&app, "cafesublime.mx").await;

    // Repeated passes never accumulate duplicates.
    assert_eq!(billing_kinds(&app, server.server_id).await, vec!["suspended"]);

    app.cleanup().await;
}

#[tokio::test]
async fn settled_server_archives_active_announcements() {
    let Some(app) = TestApp::spawn().await else { return };

    let server = app.seed_server("cafesublime.mx", 5).await;
    app.seed_invoice("cafesublime.mx", "F-4001", -13, 100000).await;

    assert_eq!(billing_kinds(&app, server.server_id).await, vec!["suspended"]);

    // Settle the debt behind the engine's back, then regenerate.
    sqlx::query("UPDATE invoices SET balance_cents = 0, status = 'paid' WHERE server_id = $1")
        .bind(server.server_id)
        .execute(app.db.pool())
        .await
        .unwrap();

    let flags = regenerate(&app, "cafesublime.mx").await;
    assert_eq!(flags["due_soon"], false);
    assert_eq!(flags["overdue"], false);
    assert_eq!(flags["suspend"], false);

    assert!(billing_kinds(&app, server.server_id).await.is_empty());
    let archived: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM announcements WHERE server_id = $1 AND status = 'archived'",
    )
    .bind(server.server_id)
    .fetch_one(app.db.pool())
    .await
    .unwrap();
    assert_eq!(archived, 1);

    app.cleanup().await;
}

#[tokio::test]
async fn grace_period_is_per_server() {
    let Some(app) = TestApp::spawn().await else { return };

    let strict = app.seed_server("strict.mx", 5).await;
    let relaxed = app.seed_server("relaxed.mx", 15).await;

    // Both overdue by 8 days; only the strict server escalates to suspension.
    app.seed_invoice("strict.mx", "F-5001", -13, 100000).await;
    app.seed_invoice("relaxed.mx", "F-5002", -13, 100000).await;

    assert_eq!(billing_kinds(&app, strict.server_id).await, vec!["suspended"]);
    assert_eq!(billing_kinds(&app, relaxed.server_id).await, vec!["overdue"]);

    app.cleanup().await;
}

#[tokio::test]
async fn regenerate_unknown_domain_is_not_found() {
    let Some(app) = TestApp::spawn().await else { return };

    let response = app
        .client
        .post(format!(
            "{}/admin/servers/unknown.mx/announcements/regenerate",
            app.address
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
