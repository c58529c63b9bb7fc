//! Server handlers.

use axum::{extract::State, http::StatusCode, Json};
use portal_core::error::AppError;
use validator::Validate;

use crate::dtos::CreateServerRequest;
use crate::middleware::AdminContext;
use crate::models::{CreateServer, Server};
use crate::startup::AppState;

/// Register a server (tenant environment).
pub async fn create_server(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<CreateServerRequest>,
) -> Result<(StatusCode, Json<Server>), AppError> {
    payload.validate()?;

    let input = CreateServer {
        name: payload.domain.trim().to_string(),
        grace_days: payload
            .grace_days
            .unwrap_or(state.config.dunning.default_grace_days),
    };

    tracing::info!(admin_id = %admin.admin_id, domain = %input.name, "Registering server");

    let server = state.db.create_server(&input).await?;

    Ok((StatusCode::CREATED, Json(server)))
}

/// Domain list for the admin selector.
pub async fn list_domains(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<String>>, AppError> {
    let names = state.db.list_server_names().await?;

    Ok(Json(names))
}
