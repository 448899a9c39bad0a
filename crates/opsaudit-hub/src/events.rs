//! Event wire model.
//!
//! Events are transient: they exist only in hub queues and on the wire,
//! never in storage. A viewer that reconnects starts from a clean slate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// New task imported.
    TaskCreated,
    /// Task review fields changed (status, comment).
    TaskUpdated,
    /// Task removed.
    TaskDeleted,
    /// Task spot-checked.
    TaskSampled,
    /// The whole list should be refreshed.
    TaskRefreshed,
    /// Sent once right after a viewer registers.
    Connected,
    /// Periodic keep-alive with empty payload.
    Heartbeat,
}

/// One workflow change, fanned out to every connected viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Task the event concerns; 0 when not applicable.
    pub task_id: i64,
    /// Free-form key/value payload.
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, task_id: i64, data: serde_json::Value) -> Self {
        Self {
            kind,
            task_id,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Render as an SSE frame: `data: <json>\n\n`.
    pub fn to_sse(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let ev = Event::new(
            EventKind::TaskUpdated,
            7,
            serde_json::json!({"audit_status": "completed"}),
        );
        let v: serde_json::Value = serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(v["type"], "task_updated");
        assert_eq!(v["task_id"], 7);
        assert_eq!(v["data"]["audit_status"], "completed");
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn test_sse_framing() {
        let ev = Event::new(EventKind::Heartbeat, 0, serde_json::json!({}));
        let frame = ev.to_sse().unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
    }
}
