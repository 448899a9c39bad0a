//! Server-Sent Events relay.
//!
//! Each connection registers with the event hub under the id
//! `{user_id}_{unix_nanos}`, immediately receives a `connected` event, then
//! relays every hub broadcast as a `data: <json>` frame. A heartbeat frame
//! goes out on the configured interval so proxies keep the socket open.
//! Unregistration happens when the stream is dropped, however the client
//! went away.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use opsaudit_hub::{ClientSubscription, Event, EventKind, HubHandle};
use tokio::sync::mpsc;

use super::server::AppState;

/// Removes the hub registration when the SSE stream is dropped.
struct Unregister {
    hub: HubHandle,
    client_id: String,
}

impl Drop for Unregister {
    fn drop(&mut self) {
        let hub = self.hub.clone();
        let client_id = std::mem::take(&mut self.client_id);
        tokio::spawn(async move {
            hub.unregister(&client_id).await;
        });
    }
}

/// GET /api/v1/events
///
/// Query params: `user_id` and `page` are read out; everything else is kept
/// as advisory filter state on the subscription.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let user_id = params
        .remove("user_id")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let page = params
        .remove("page")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(1);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let client_id = format!("{user_id}_{nanos}");

    let (tx, mut rx) = mpsc::channel(state.client_capacity.max(1));
    state
        .hub
        .register(ClientSubscription {
            id: client_id.clone(),
            user_id,
            page,
            filters: params,
            sender: tx,
        })
        .await;
    tracing::info!(client_id, "sse viewer connected");

    let guard = Unregister {
        hub: state.hub.clone(),
        client_id: client_id.clone(),
    };
    let heartbeat_secs = state.heartbeat_secs.max(1);

    let stream = async_stream::stream! {
        let _guard = guard;

        let connected = Event::new(
            EventKind::Connected,
            0,
            serde_json::json!({"client_id": client_id}),
        );
        if let Ok(frame) = connected.to_sse() {
            yield Ok::<_, Infallible>(frame);
        }

        let mut heartbeat = tokio::time::interval(Duration::from_secs(heartbeat_secs));
        heartbeat.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(event) => match event.to_sse() {
                        Ok(frame) => yield Ok(frame),
                        Err(e) => tracing::warn!("unserializable event skipped: {e}"),
                    },
                    // Hub dropped our sender; the connection is done.
                    None => break,
                },
                _ = heartbeat.tick() => {
                    let hb = Event::new(EventKind::Heartbeat, 0, serde_json::json!({}));
                    if let Ok(frame) = hb.to_sse() {
                        yield Ok(frame);
                    }
                }
            }
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use futures::StreamExt;
    use opsaudit_core::config::OpsAuditConfig;
    use opsaudit_db::AuditDb;
    use opsaudit_hub::EventHub;
    use opsaudit_scheduler::ScheduleRunner;
    use opsaudit_workflow::AuditWorkflow;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_stream_opens_with_connected_event() {
        let db = Arc::new(AuditDb::open_in_memory().unwrap());
        let (hub, handle) = EventHub::new();
        tokio::spawn(hub.run());
        let workflow = Arc::new(AuditWorkflow::new(db.clone(), handle.clone()));
        let runner = Arc::new(ScheduleRunner::new(db));
        let cfg = OpsAuditConfig::default();
        let state = AppState::new(workflow.clone(), handle, runner, &cfg.gateway, &cfg.hub);

        let router: Router = Router::new()
            .route("/events", get(event_stream))
            .with_state(Arc::new(state));

        let resp = router
            .oneshot(
                axum::http::Request::get("/events?user_id=7&page=2&status=completed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE.as_str()],
            "text/event-stream"
        );

        let mut body = resp.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));
        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(json["type"], "connected");
        assert!(json["data"]["client_id"].as_str().unwrap().starts_with("7_"));

        // A workflow mutation shows up on the open stream.
        workflow.create_task("live.xlsx", "", "", &[]).unwrap();
        let next = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(next.to_vec()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(json["type"], "task_created");
    }
}
