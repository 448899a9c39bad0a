//! Row types mapped to and from the SQLite schema.

use chrono::NaiveDate;
use opsaudit_core::model::{AuditStatus, Frequency, ReminderStatus, SampleResult};
use serde::Serialize;

/// One imported audit batch going through the review workflow.
#[derive(Debug, Clone, Serialize)]
pub struct AuditTask {
    pub id: i64,
    pub file_name: String,
    pub organization: String,
    pub archive_type: String,
    pub audit_status: AuditStatus,
    pub audit_comment: Option<String>,
    pub is_sampled: bool,
    pub last_sampled_at: Option<String>,
    pub import_time: String,
    pub updated_at: String,
}

/// Append-only pre-change snapshot of a task's comment/status.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub audit_comment: Option<String>,
    pub audit_status: AuditStatus,
    pub auditor: String,
    pub audit_time: String,
}

/// Append-only spot-check record; the latest row per task is the
/// "last sample result".
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    pub id: i64,
    pub task_id: i64,
    pub sampled_by: String,
    pub sample_comment: String,
    pub sample_result: SampleResult,
    pub sampled_at: String,
}

/// A scheduled video-retention reminder.
///
/// `file_name`/`organization` come from a LEFT JOIN against the task row and
/// are `None` for orphaned reminders.
#[derive(Debug, Clone, Serialize)]
pub struct VideoReminder {
    pub id: i64,
    pub task_id: i64,
    pub earliest_video_date: NaiveDate,
    pub required_days: i64,
    pub actual_days: i64,
    pub reminder_date: NaiveDate,
    pub status: ReminderStatus,
    pub created_at: String,
    pub notified_at: Option<String>,
    pub completed_at: Option<String>,
    pub completed_by: Option<String>,
    pub file_name: Option<String>,
    pub organization: Option<String>,
}

/// The sweep-schedule singleton. Only the most recently saved row exists.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleConfig {
    pub frequency: Frequency,
    pub hour: u32,
    /// 1 = Monday .. 7 = Sunday; meaningful only when weekly.
    pub day_of_week: Option<u32>,
    pub enabled: bool,
    pub updated_by: Option<String>,
}

impl Default for ScheduleConfig {
    /// Hard-coded fallback: daily at 01:00, enabled.
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            hour: 1,
            day_of_week: None,
            enabled: true,
            updated_by: None,
        }
    }
}
