//! Application startup and lifecycle management.

use crate::config::PortalConfig;
use crate::handlers;
use crate::services::{init_metrics, Database};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use portal_core::error::AppError;
use portal_core::middleware::metrics::metrics_middleware;
use portal_core::middleware::security_headers::security_headers_middleware;
use portal_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub db: Arc<Database>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: PortalConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: PortalConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: PortalConfig, run_migrations: bool) -> Result<Self, AppError> {
        // Initialize metrics
        init_metrics();

        // Connect to database
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let state = AppState {
            config: config.clone(),
            db: Arc::new(db),
        };

        // Bind listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Billing portal listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_handler))
            // User portal endpoints
            .route(
                "/servers/:domain/invoices",
                get(handlers::invoices::list_server_invoices),
            )
            .route(
                "/servers/:domain/announcements",
                get(handlers::announcements::list_server_announcements),
            )
            .route("/payments", post(handlers::payments::submit_payment))
            // Admin endpoints
            .route(
                "/admin/servers",
                get(handlers::servers::list_domains).post(handlers::servers::create_server),
            )
            .route(
                "/admin/servers/:domain/announcements/regenerate",
                post(handlers::announcements::regenerate_announcements),
            )
            .route(
                "/admin/invoices",
                get(handlers::invoices::list_invoices_admin)
                    .post(handlers::invoices::create_invoice),
            )
            .route(
                "/admin/payments",
                get(handlers::payments::list_payments_admin),
            )
            .route("/admin/payments/:id", get(handlers::payments::get_payment))
            .route(
                "/admin/payments/:id/validate",
                post(handlers::payments::validate_payment),
            )
            .route(
                "/admin/payments/:id/reject",
                post(handlers::payments::reject_payment),
            )
            .route(
                "/admin/payments/:id/apply",
                post(handlers::payments::apply_payment),
            )
            .route(
                "/admin/announcements",
                post(handlers::announcements::create_announcement),
            )
            .route(
                "/admin/announcements/:id",
                get(handlers::announcements::get_announcement)
                    .put(handlers::announcements::update_announcement),
            )
            .route("/admin/alerts", get(handlers::alerts::list_alerts))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(CorsLayer::permissive())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(self.state);

        tracing::info!(
            service = "billing-portal",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await?;

        Ok(())
    }
}
