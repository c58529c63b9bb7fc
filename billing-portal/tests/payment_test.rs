//! Payment lifecycle tests: submission validation and the
//! pending → validated → applied state machine.

mod common;

use common::{TestApp, TEST_ADMIN_ID};
use uuid::Uuid;

async fn payment_count(app: &TestApp) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments")
        .fetch_one(app.db.pool())
        .await
        .unwrap()
}

async fn suspended_statuses(app: &TestApp, server_id: Uuid) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT status FROM announcements WHERE server_id = $1 AND kind = 'suspended'",
    )
    .bind(server_id)
    .fetch_all(app.db.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn allocation_sum_mismatch_is_rejected_before_any_write() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-1001", 0, 100000).await;

    let response = app
        .client
        .post(format!("{}/payments", app.address))
        .json(&serde_json::json!({
            "domain": "cafesublime.mx",
            "allocations": [{ "invoice_id": invoice_id, "amount_cents": 90000 }],
            "amount_cents": 100000,
            "method": "transfer",
            "proof_ref": "attachments/receipt.pdf"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(payment_count(&app).await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn allocation_exceeding_invoice_balance_is_rejected() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-1002", 0, 100000).await;

    let response = app
        .client
        .post(format!("{}/payments", app.address))
        .json(&serde_json::json!({
            "domain": "cafesublime.mx",
            "allocations": [{ "invoice_id": invoice_id, "amount_cents": 120000 }],
            "amount_cents": 120000,
            "method": "transfer",
            "proof_ref": "attachments/receipt.pdf"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(payment_count(&app).await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn allocation_against_unknown_invoice_is_rejected() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;

    let response = app
        .client
        .post(format!("{}/payments", app.address))
        .json(&serde_json::json!({
            "domain": "cafesublime.mx",
            "allocations": [{ "invoice_id": Uuid::new_v4(), "amount_cents": 50000 }],
            "amount_cents": 50000,
            "method": "transfer",
            "proof_ref": "attachments/receipt.pdf"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn submission_records_pending_payment_with_allocations_and_alert() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-1003", 0, 100000).await;
    let payment_id = app
        .seed_payment("cafesublime.mx", &[(invoice_id, 40000)], 40000)
        .await;

    let payment = app.db.get_payment(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, "pending");
    assert_eq!(payment.amount_cents, 40000);

    let allocations = app.db.list_allocations(payment_id).await.unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].invoice_id, invoice_id);
    assert_eq!(allocations[0].amount_cents, 40000);

    // Submission leaves invoice balances untouched.
    let invoice = app.db.get_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.balance_cents, 100000);

    // An admin alert is recorded alongside the payment.
    let response = app
        .client
        .get(format!("{}/admin/alerts?type=payment_received", app.address))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["domain"], "cafesublime.mx");

    app.cleanup().await;
}

#[tokio::test]
async fn full_payment_lifecycle_clears_invoice_and_archives_suspension() {
    let Some(app) = TestApp::spawn().await else { return };

    let server = app.seed_server("cafesublime.mx", 5).await;
    // Issued 13 days ago: due 8 days ago, past the 5-day grace period.
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-2001", -13, 100000).await;

    assert_eq!(suspended_statuses(&app, server.server_id).await, vec!["active"]);

    let payment_id = app
        .seed_payment("cafesublime.mx", &[(invoice_id, 100000)], 100000)
        .await;

    let response = app
        .client
        .post(format!(
            "{}/admin/payments/{}/validate",
            app.address, payment_id
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "validated");
    assert_eq!(body["validated_by"], TEST_ADMIN_ID);

    let response = app
        .client
        .post(format!("{}/admin/payments/{}/apply", app.address, payment_id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let invoice = app.db.get_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.balance_cents, 0);
    assert_eq!(invoice.status, "paid");

    let payment = app.db.get_payment(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, "applied");

    // The suspension was archived in the same transaction as the application.
    assert_eq!(
        suspended_statuses(&app, server.server_id).await,
        vec!["archived"]
    );

    app.cleanup().await;
}

#[tokio::test]
async fn apply_is_idempotent_by_guard() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-3001", 0, 100000).await;
    let payment_id = app
        .seed_payment("cafesublime.mx", &[(invoice_id, 60000)], 60000)
        .await;

    app.client
        .post(format!(
            "{}/admin/payments/{}/validate",
            app.address, payment_id
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();

    let first = app
        .client
        .post(format!("{}/admin/payments/{}/apply", app.address, payment_id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = app
        .client
        .post(format!("{}/admin/payments/{}/apply", app.address, payment_id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);

    // The balance was decremented exactly once.
    let invoice = app.db.get_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.balance_cents, 40000);
    assert_eq!(invoice.status, "partial");

    app.cleanup().await;
}

#[tokio::test]
async fn apply_requires_a_validated_payment() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-4001", 0, 100000).await;
    let payment_id = app
        .seed_payment("cafesublime.mx", &[(invoice_id, 50000)], 50000)
        .await;

    // Still pending: apply must conflict and change nothing.
    let response = app
        .client
        .post(format!("{}/admin/payments/{}/apply", app.address, payment_id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let invoice = app.db.get_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.balance_cents, 100000);

    // An unknown payment reports the same conflict class.
    let response = app
        .client
        .post(format!(
            "{}/admin/payments/{}/apply",
            app.address,
            Uuid::new_v4()
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn reject_is_strictly_guarded() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let invoice_id = app.seed_invoice("cafesublime.mx", "F-5001", 0, 100000).await;
    let payment_id = app
        .seed_payment("cafesublime.mx", &[(invoice_id, 50000)], 50000)
        .await;

    let response = app
        .client
        .post(format!(
            "{}/admin/payments/{}/reject",
            app.address, payment_id
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .json(&serde_json::json!({ "reason": "Illegible receipt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["rejection_reason"], "Illegible receipt");

    // Rejected is terminal: a second reject and a validate both conflict.
    let response = app
        .client
        .post(format!(
            "{}/admin/payments/{}/reject",
            app.address, payment_id
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .json(&serde_json::json!({ "reason": "Duplicate" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let response = app
        .client
        .post(format!(
            "{}/admin/payments/{}/validate",
            app.address, payment_id
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn one_payment_can_settle_multiple_invoices() {
    let Some(app) = TestApp::spawn().await else { return };

    app.seed_server("cafesublime.mx", 5).await;
    let first = app.seed_invoice("cafesublime.mx", "F-6001", 0, 100000).await;
    let second = app.seed_invoice("cafesublime.mx", "F-6002", 0, 250000).await;

    let payment_id = app
        .seed_payment(
            "cafesublime.mx",
            &[(first, 100000), (second, 100000)],
            200000,
        )
        .await;

    app.client
        .post(format!(
            "{}/admin/payments/{}/validate",
            app.address, payment_id
        ))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    let response = app
        .client
        .post(format!("{}/admin/payments/{}/apply", app.address, payment_id))
        .header("X-Admin-Id", TEST_ADMIN_ID)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let first = app.db.get_invoice(first).await.unwrap().unwrap();
    assert_eq!(first.balance_cents, 0);
    assert_eq!(first.status, "paid");

    let second = app.db.get_invoice(second).await.unwrap().unwrap();
    assert_eq!(second.balance_cents, 150000);
    assert_eq!(second.status, "partial");

    app.cleanup().await;
}
