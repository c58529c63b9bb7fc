//! Operational endpoint tests.

mod common;

use common::TestApp;

#[tokio::test]
async fn health_ready_and_metrics_respond() {
    let Some(app) = TestApp::spawn().await else { return };

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "billing-portal");

    let response = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Exercise a database operation so the query histogram has samples.
    app.seed_server("cafesublime.mx", 5).await;

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("portal_db_query_duration_seconds"));

    app.cleanup().await;
}
