//! Announcement handlers.
//!
//! The user-facing listing shows everything whose display window is still
//! open. The regenerate endpoint exposes the dunning engine as an explicit
//! administrative trigger; manual announcements share the same store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use portal_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateAnnouncementRequest, RegenerateResponse, UpdateAnnouncementRequest};
use crate::middleware::AdminContext;
use crate::models::{Announcement, CreateAnnouncement, UpdateAnnouncement};
use crate::startup::AppState;

/// List a server's non-expired announcements.
pub async fn list_server_announcements(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    let server = state
        .db
        .get_server_by_name(&domain)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server domain not found")))?;

    let announcements = state.db.list_current_announcements(server.server_id).await?;

    Ok(Json(announcements))
}

/// Recompute a server's dunning announcements on demand.
pub async fn regenerate_announcements(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(domain): Path<String>,
) -> Result<Json<RegenerateResponse>, AppError> {
    let server = state
        .db
        .get_server_by_name(&domain)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server domain not found")))?;

    tracing::info!(admin_id = %admin.admin_id, domain = %server.name, "Regenerating announcements");

    let dunning = state
        .db
        .regenerate_announcements(&server, Utc::now().date_naive())
        .await?;

    Ok(Json(RegenerateResponse::from_state(dunning)))
}

/// Create a manual announcement.
pub async fn create_announcement(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    payload.validate()?;

    let server = state
        .db
        .get_server_by_name(&payload.domain)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server domain not found")))?;

    let input = CreateAnnouncement {
        server_id: server.server_id,
        kind: payload.kind,
        title: payload.title,
        body: payload.body,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        created_by: Some(admin.admin_id),
    };

    let announcement = state.db.create_announcement(&input).await?;

    Ok((StatusCode::CREATED, Json(announcement)))
}

/// Get an announcement by ID.
pub async fn get_announcement(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(announcement_id): Path<Uuid>,
) -> Result<Json<Announcement>, AppError> {
    let announcement = state
        .db
        .get_announcement(announcement_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Announcement not found")))?;

    Ok(Json(announcement))
}

/// Update a manual announcement.
pub async fn update_announcement(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(announcement_id): Path<Uuid>,
    Json(payload): Json<UpdateAnnouncementRequest>,
) -> Result<Json<Announcement>, AppError> {
    payload.validate()?;

    let input = UpdateAnnouncement {
        kind: payload.kind,
        title: payload.title,
        body: payload.body,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
    };

    let announcement = state
        .db
        .update_announcement(announcement_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Announcement not found")))?;

    Ok(Json(announcement))
}
