//! API route handlers for the gateway.
//!
//! Every handler responds with a `{"ok": ...}` envelope. Failures map to
//! HTTP status by error class: validation → 400, missing rows → 404,
//! everything else → 500.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opsaudit_core::error::AuditError;
use opsaudit_core::model::{AuditStatus, Frequency, ReminderStatus, SampleResult};
use opsaudit_db::model::ScheduleConfig;
use opsaudit_workflow::reminder;
use serde::Deserialize;

use super::server::AppState;

pub struct ApiError(AuditError);

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuditError::Validation(_) => StatusCode::BAD_REQUEST,
            AuditError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({"ok": false, "error": self.0.to_string()}));
        (status, body).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "opsaudit-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub file_name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub archive_type: String,
    #[serde(default)]
    pub details: Vec<String>,
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult {
    let task = state.workflow.create_task(
        &req.file_name,
        &req.organization,
        &req.archive_type,
        &req.details,
    )?;
    Ok(Json(serde_json::json!({"ok": true, "task": task})))
}

pub async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult {
    let task = state.workflow.get_task(id)?;
    let reminders = reminder::count_for_task(state.workflow.db(), id)?;
    Ok(Json(
        serde_json::json!({"ok": true, "task": task, "active_reminders": reminders}),
    ))
}

pub async fn delete_task(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult {
    state.workflow.delete_task(id)?;
    Ok(Json(serde_json::json!({"ok": true, "message": "task deleted"})))
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub audit_status: AuditStatus,
    #[serde(default)]
    pub audit_comment: String,
    #[serde(default = "anonymous")]
    pub updated_by: String,
}

fn anonymous() -> String {
    "anonymous".to_string()
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult {
    state
        .workflow
        .set_status(id, req.audit_status, &req.audit_comment, &req.updated_by)?;
    Ok(Json(serde_json::json!({"ok": true, "message": "status saved"})))
}

#[derive(Deserialize)]
pub struct SaveSampleRequest {
    pub sample_result: SampleResult,
    #[serde(default)]
    pub sample_comment: String,
    #[serde(default = "anonymous")]
    pub sampled_by: String,
}

pub async fn save_sample(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SaveSampleRequest>,
) -> ApiResult {
    state
        .workflow
        .save_sample(id, &req.sampled_by, &req.sample_comment, req.sample_result)?;
    Ok(Json(serde_json::json!({"ok": true, "message": "sample saved"})))
}

pub async fn mark_fixed(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult {
    state.workflow.mark_fixed(id)?;
    Ok(Json(
        serde_json::json!({"ok": true, "message": "task cleared for resampling"}),
    ))
}

pub async fn task_history(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult {
    let history = state.workflow.history(id)?;
    Ok(Json(serde_json::json!({"ok": true, "history": history})))
}

pub async fn task_samples(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult {
    let samples = state.workflow.samples(id)?;
    Ok(Json(serde_json::json!({"ok": true, "samples": samples})))
}

#[derive(Deserialize)]
pub struct ReminderListQuery {
    pub status: Option<ReminderStatus>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ReminderListQuery>,
) -> ApiResult {
    let (reminders, total) =
        reminder::list(state.workflow.db(), q.status, q.page, q.page_size)?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "reminders": reminders,
        "total": total,
        "page": q.page.max(1),
        "page_size": q.page_size,
    })))
}

#[derive(Deserialize)]
pub struct CompleteReminderRequest {
    #[serde(default = "anonymous")]
    pub completed_by: String,
}

pub async fn complete_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<CompleteReminderRequest>,
) -> ApiResult {
    reminder::complete(state.workflow.db(), id, &req.completed_by)?;
    Ok(Json(
        serde_json::json!({"ok": true, "message": "reminder completed"}),
    ))
}

#[derive(Deserialize)]
pub struct DeleteRemindersRequest {
    pub ids: Vec<i64>,
}

pub async fn delete_reminders(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRemindersRequest>,
) -> ApiResult {
    if req.ids.is_empty() {
        return Err(AuditError::validation("no reminder ids given").into());
    }
    let deleted = reminder::delete(state.workflow.db(), &req.ids)?;
    Ok(Json(serde_json::json!({"ok": true, "deleted": deleted})))
}

pub async fn get_schedule(State(state): State<Arc<AppState>>) -> ApiResult {
    let cfg = state.runner.load_config()?;
    Ok(Json(serde_json::json!({"ok": true, "schedule": cfg})))
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub frequency: Frequency,
    pub hour: u32,
    pub day_of_week: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub updated_by: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Persist a new sweep schedule and restart the runner so it takes effect
/// immediately.
pub async fn save_schedule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult {
    state
        .runner
        .save_config(ScheduleConfig {
            frequency: req.frequency,
            hour: req.hour,
            day_of_week: req.day_of_week,
            enabled: req.enabled,
            updated_by: req.updated_by,
        })
        .await?;
    Ok(Json(
        serde_json::json!({"ok": true, "message": "schedule saved"}),
    ))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use opsaudit_core::config::OpsAuditConfig;
    use opsaudit_db::AuditDb;
    use opsaudit_hub::EventHub;
    use opsaudit_scheduler::ScheduleRunner;
    use opsaudit_workflow::AuditWorkflow;
    use std::sync::Arc;
    use tower::ServiceExt;

    use super::super::server::{AppState, build_router};

    fn test_router() -> Router {
        let db = Arc::new(AuditDb::open_in_memory().unwrap());
        let (hub, handle) = EventHub::new();
        tokio::spawn(hub.run());
        let workflow = Arc::new(AuditWorkflow::new(db.clone(), handle.clone()));
        let runner = Arc::new(ScheduleRunner::new(db));
        let cfg = OpsAuditConfig::default();
        build_router(AppState::new(workflow, handle, runner, &cfg.gateway, &cfg.hub))
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let router = test_router();
        let (status, body) = send(
            &router,
            Request::get("/api/v1/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_fetch_task() {
        let router = test_router();
        let (status, body) = send(
            &router,
            post_json(
                "/api/v1/tasks",
                serde_json::json!({
                    "file_name": "batch-07.xlsx",
                    "organization": "west branch",
                    "details": ["row 1", "row 2"],
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let id = body["task"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &router,
            Request::get(format!("/api/v1/tasks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["file_name"], "batch-07.xlsx");
        assert_eq!(body["task"]["audit_status"], "unreviewed");
        assert_eq!(body["active_reminders"], 0);
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let router = test_router();
        let (status, body) = send(
            &router,
            post_json("/api/v1/tasks", serde_json::json!({"file_name": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_missing_task_maps_to_404() {
        let router = test_router();
        let (status, body) = send(
            &router,
            Request::get("/api/v1/tasks/9999").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_status_transition_and_history() {
        let router = test_router();
        let (_, body) = send(
            &router,
            post_json("/api/v1/tasks", serde_json::json!({"file_name": "b.xlsx"})),
        )
        .await;
        let id = body["task"]["id"].as_i64().unwrap();

        let (status, _) = send(
            &router,
            post_json(
                &format!("/api/v1/tasks/{id}/status"),
                serde_json::json!({
                    "audit_status": "completed",
                    "audit_comment": "looks good",
                    "updated_by": "reviewer-a",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            Request::get(format!("/api/v1/tasks/{id}/history"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
        assert_eq!(body["history"][0]["audit_status"], "unreviewed");
    }

    #[tokio::test]
    async fn test_schedule_roundtrip() {
        let router = test_router();
        let (status, body) = send(
            &router,
            Request::get("/api/v1/schedule").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["schedule"]["frequency"], "daily");

        let (status, _) = send(
            &router,
            post_json(
                "/api/v1/schedule",
                serde_json::json!({"frequency": "weekly", "hour": 3, "day_of_week": 5}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(
            &router,
            Request::get("/api/v1/schedule").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["schedule"]["frequency"], "weekly");
        assert_eq!(body["schedule"]["day_of_week"], 5);

        let (status, _) = send(
            &router,
            post_json(
                "/api/v1/schedule",
                serde_json::json!({"frequency": "weekly", "hour": 3}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
