//! Manual announcement CRUD and user-portal listing tests.

mod common;

use chrono::{Duration, Utc};
use common::{TestApp, TEST_ADMIN_ID};

#[tokio::test]
async fn manual_announcement_crud_round_trip() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;

    let now = Utc::now();
    let response = app
        .client
        .post(format!("{}/admin/announcements", app.address))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .json(&serde_json::json!({
            "domain": "cafesublime.mx",
            "kind": "due_soon",
            "title": "Scheduled maintenance billing pause",
            "body": "  Billing runs resume on Monday.  ",
            "starts_at": now,
            "ends_at": now + Duration::days(7)
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: serde_json::Value = response.json().await.unwrap();
    assert_eq!(created["status"], "active");
    assert_eq!(created["created_by"], TEST_ADMIN_ID);
    // Body whitespace is trimmed on write.
    assert_eq!(created["body"], "Billing runs resume on Monday.");

    let id = created["announcement_id"].as_str().unwrap();

    let response = app
        .client
        .get(format!("{}/admin/announcements/{}", app.address, id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .put(format!("{}/admin/announcements/{}", app.address, id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .json(&serde_json::json!({ "title": "Maintenance window extended" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(updated["title"], "Maintenance window extended");
    // Untouched fields keep their values.
    assert_eq!(updated["kind"], "due_soon");

    app.cleanup().await;
}

#[tokio::test]
async fn announcement_mutation_requires_admin_header() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;

    let now = Utc::now();
    let response = app
        .client
        .post(format!("{}/admin/announcements", app.address))
        .json(&serde_json::json!({
            "domain": "cafesublime.mx",
            "kind": "due_soon",
            "title": "No auth",
            "starts_at": now,
            "ends_at": now + Duration::days(1)
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    app.cleanup().await;
}

#[tokio::test]
async fn user_listing_hides_expired_announcements() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;

    let now = Utc::now();
    for (title, ends_at) in [
        ("Current notice", now + Duration::days(5)),
        ("Expired notice", now - Duration::days(1)),
    ] {
        let response = app
            .client
            .post(format!("{}/admin/announcements", app.address))
            .header("X-Admin-Id", TEST_ADMIN_ID)
            .json(&serde_json::json!({
                "domain": "cafesublime.mx",
                "kind": "overdue",
                "title": title,
                "starts_at": now - Duration::days(10),
                "ends_at": ends_at
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    let response = app
        .client
        .get(format!(
            "{}/servers/cafesublime.mx/announcements",
            app.address
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Current notice"]);

    app.cleanup().await;
}
