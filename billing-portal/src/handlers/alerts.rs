//! Alert handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use portal_core::error::AppError;

use crate::dtos::{ListAlertsQuery, Paginated};
use crate::middleware::AdminContext;
use crate::models::AdminAlertRow;
use crate::startup::AppState;

/// Paginated admin alert feed.
pub async fn list_alerts(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<Paginated<AdminAlertRow>>, AppError> {
    let filter = query.into_filter();
    let (rows, total) = state.db.list_alerts_admin(&filter).await?;

    Ok(Json(Paginated::new(rows, total, filter.page, filter.limit)))
}
