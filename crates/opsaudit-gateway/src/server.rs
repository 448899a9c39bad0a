//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use opsaudit_core::config::{GatewayConfig, HubConfig};
use opsaudit_hub::HubHandle;
use opsaudit_scheduler::ScheduleRunner;
use opsaudit_workflow::AuditWorkflow;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    /// The audit-task state machine. All task mutations go through it.
    pub workflow: Arc<AuditWorkflow>,
    /// Entry point to the event hub, used by the SSE relay.
    pub hub: HubHandle,
    /// The reminder schedule runner; saving a schedule restarts its loop.
    pub runner: Arc<ScheduleRunner>,
    /// Heartbeat interval for SSE streams, seconds.
    pub heartbeat_secs: u64,
    /// Per-viewer event buffer size.
    pub client_capacity: usize,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        workflow: Arc<AuditWorkflow>,
        hub: HubHandle,
        runner: Arc<ScheduleRunner>,
        gateway: &GatewayConfig,
        hub_cfg: &HubConfig,
    ) -> Self {
        Self {
            workflow,
            hub,
            runner,
            heartbeat_secs: gateway.heartbeat_secs,
            client_capacity: hub_cfg.client_capacity,
            start_time: std::time::Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/v1/health", get(super::routes::health_check))
        .route("/api/v1/tasks", post(super::routes::create_task))
        .route("/api/v1/tasks/{id}", get(super::routes::get_task))
        .route("/api/v1/tasks/{id}", delete(super::routes::delete_task))
        .route("/api/v1/tasks/{id}/status", post(super::routes::set_status))
        .route("/api/v1/tasks/{id}/sample", post(super::routes::save_sample))
        .route("/api/v1/tasks/{id}/fixed", post(super::routes::mark_fixed))
        .route("/api/v1/tasks/{id}/history", get(super::routes::task_history))
        .route("/api/v1/tasks/{id}/samples", get(super::routes::task_samples))
        .route("/api/v1/reminders", get(super::routes::list_reminders))
        .route(
            "/api/v1/reminders/{id}/complete",
            post(super::routes::complete_reminder),
        )
        .route(
            "/api/v1/reminders/delete",
            post(super::routes::delete_reminders),
        )
        .route("/api/v1/schedule", get(super::routes::get_schedule))
        .route("/api/v1/schedule", post(super::routes::save_schedule))
        .route("/api/v1/events", get(super::sse::event_stream));

    api.layer({
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600));

        // Restrict CORS origins in production via env var
        // Example: OPSAUDIT_CORS_ORIGINS=https://audit.example.com
        if let Ok(origins_str) = std::env::var("OPSAUDIT_CORS_ORIGINS") {
            let origins: Vec<_> = origins_str
                .split(',')
                .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins)
        } else {
            cors.allow_origin(Any)
        }
    })
    .layer(TraceLayer::new_for_http())
    .with_state(Arc::new(state))
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, listen: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("🌐 gateway listening on http://{listen}");
    axum::serve(listener, app).await?;
    Ok(())
}
