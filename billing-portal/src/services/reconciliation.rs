//! Dunning reconciliation engine.
//!
//! Classifies a server's open invoices against its grace period and keeps the
//! announcement store in sync with billing state. Every entry point runs
//! inside the caller's transaction so a reconciliation pass commits or rolls
//! back as a unit.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use portal_core::error::AppError;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::models::{AnnouncementKind, Server};
use crate::services::metrics::ANNOUNCEMENTS_GENERATED_TOTAL;

/// Display window for a due-soon announcement.
pub const DUE_SOON_WINDOW_DAYS: i64 = 10;
/// Display window for an overdue announcement.
pub const OVERDUE_WINDOW_DAYS: i64 = 10;
/// Display window for a suspension announcement.
pub const SUSPENSION_WINDOW_DAYS: i64 = 30;

/// An invoice with outstanding balance, as seen by the classifier.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OpenInvoice {
    pub due_date: NaiveDate,
    pub balance_cents: i64,
}

/// Dunning flags for one server.
///
/// Flags are not mutually exclusive: a server can hold an invoice that is
/// about to fall due and another that is already past its grace period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DunningState {
    pub due_soon: bool,
    pub overdue: bool,
    pub suspend: bool,
}

impl DunningState {
    /// No outstanding debt in any bucket; drives the full unlock.
    pub fn is_clear(&self) -> bool {
        !self.due_soon && !self.overdue && !self.suspend
    }
}

/// Classify open invoices relative to `today` and a grace period in days.
///
/// Per invoice: due within `(0, grace_days]` days sets `due_soon`; overdue by
/// `(0, grace_days]` days sets `overdue`; overdue by more than `grace_days`
/// sets `suspend`. An invoice due exactly today sets no flag.
pub fn classify(invoices: &[OpenInvoice], grace_days: i64, today: NaiveDate) -> DunningState {
    let mut state = DunningState::default();

    for invoice in invoices {
        let days_until_due = (invoice.due_date - today).num_days();
        let days_overdue = (today - invoice.due_date).num_days();

        if days_until_due > 0 && days_until_due <= grace_days {
            state.due_soon = true;
        } else if days_overdue > 0 && days_overdue <= grace_days {
            state.overdue = true;
        } else if days_overdue > grace_days {
            state.suspend = true;
        }
    }

    state
}

/// Recompute the dunning state for one server and rewrite its announcements.
///
/// When the server is clear, every active announcement is archived and nothing
/// new is created. Otherwise the previous billing announcements are replaced
/// wholesale, so repeated invocations never accumulate duplicates. Only the
/// announcement store is written; invoices and payments are untouched.
pub async fn regenerate_for_server(
    conn: &mut PgConnection,
    server: &Server,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DunningState, AppError> {
    let open_invoices = sqlx::query_as::<_, OpenInvoice>(
        r#"
        SELECT due_date, balance_cents
        FROM invoices
        WHERE server_id = $1 AND balance_cents > 0
        ORDER BY due_date ASC
        "#,
    )
    .bind(server.server_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load open invoices: {}", e)))?;

    let state = classify(&open_invoices, i64::from(server.grace_days), today);

    if state.is_clear() {
        // Balance settled: archive whatever is still showing, suspension included.
        sqlx::query(
            r#"
            UPDATE announcements
            SET status = 'archived', ends_at = $2, updated_utc = $2
            WHERE server_id = $1 AND status = 'active'
            "#,
        )
        .bind(server.server_id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to archive announcements: {}", e))
        })?;

        info!(server_id = %server.server_id, "Balance settled, announcements archived");
        return Ok(state);
    }

    // Replace the previous cycle's billing announcements so regeneration stays
    // idempotent.
    sqlx::query(
        r#"
        DELETE FROM announcements
        WHERE server_id = $1 AND kind IN ('due_soon', 'overdue', 'suspended')
        "#,
    )
    .bind(server.server_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to clear announcements: {}", e))
    })?;

    if state.due_soon {
        insert_announcement(
            &mut *conn,
            server.server_id,
            AnnouncementKind::DueSoon,
            "Invoice due soon",
            "An invoice is approaching its due date. Please submit your payment to keep your service current.",
            now,
            now + Duration::days(DUE_SOON_WINDOW_DAYS),
        )
        .await?;
    }

    // Suspension suppresses the overdue notice: only the stronger signal is shown.
    if state.overdue && !state.suspend {
        let deadline = today + Duration::days(i64::from(server.grace_days));
        insert_announcement(
            &mut *conn,
            server.server_id,
            AnnouncementKind::Overdue,
            "Invoice overdue",
            &format!(
                "An invoice is past due. Settle the outstanding balance before {} to avoid suspension.",
                deadline
            ),
            now,
            now + Duration::days(OVERDUE_WINDOW_DAYS),
        )
        .await?;
    }

    if state.suspend {
        insert_announcement(
            &mut *conn,
            server.server_id,
            AnnouncementKind::Suspended,
            "Service suspended",
            "Your service has been suspended for non-payment. Upload your payment receipt to restore access.",
            now,
            now + Duration::days(SUSPENSION_WINDOW_DAYS),
        )
        .await?;
    }

    info!(
        server_id = %server.server_id,
        due_soon = state.due_soon,
        overdue = state.overdue,
        suspend = state.suspend,
        "Announcements regenerated"
    );

    Ok(state)
}

/// Archive the active suspension announcement once the server's aggregate
/// balance reaches zero. Returns whether the server is settled.
///
/// Kept as an explicit safeguard after payment application, in addition to the
/// clear branch of [`regenerate_for_server`].
pub async fn unlock_if_settled(
    conn: &mut PgConnection,
    server_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let total_balance: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(balance_cents), 0)::BIGINT
        FROM invoices
        WHERE server_id = $1
        "#,
    )
    .bind(server_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to sum outstanding balance: {}", e))
    })?;

    if total_balance > 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        UPDATE announcements
        SET status = 'archived', ends_at = $2, updated_utc = $2
        WHERE server_id = $1 AND kind = 'suspended' AND status = 'active'
        "#,
    )
    .bind(server_id)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to archive suspension: {}", e))
    })?;

    info!(server_id = %server_id, "Outstanding balance settled, suspension lifted");
    Ok(true)
}

async fn insert_announcement(
    conn: &mut PgConnection,
    server_id: Uuid,
    kind: AnnouncementKind,
    title: &str,
    body: &str,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO announcements
            (announcement_id, server_id, kind, title, body, starts_at, ends_at, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'active')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(server_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(body)
    .bind(starts_at)
    .bind(ends_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to insert announcement: {}", e))
    })?;

    ANNOUNCEMENTS_GENERATED_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc();

    Ok(())
}
