//! SQL operations on video reminders and the schedule-config singleton.

use chrono::NaiveDate;
use opsaudit_core::error::{AuditError, Result};
use opsaudit_core::model::ReminderStatus;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::model::{ScheduleConfig, VideoReminder};
use crate::{conv_err, db_err, now_ts};

const DATE_FMT: &str = "%Y-%m-%d";

fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| conv_err(AuditError::storage(format!("bad stored date '{s}': {e}"))))
}

/// Is there an active (not completed) reminder for this exact key?
pub fn active_reminder_exists(
    conn: &Connection,
    task_id: i64,
    earliest_date: NaiveDate,
    required_days: i64,
) -> Result<bool> {
    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM video_reminders
             WHERE task_id = ?1 AND earliest_video_date = ?2 AND required_days = ?3
               AND status != 'completed'",
            params![task_id, fmt_date(earliest_date), required_days],
            |r| r.get(0),
        )
        .map_err(db_err)?;
    Ok(n > 0)
}

/// Insert a new pending reminder. Returns the new id.
pub fn insert_reminder(
    conn: &Connection,
    task_id: i64,
    earliest_date: NaiveDate,
    required_days: i64,
    actual_days: i64,
    reminder_date: NaiveDate,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO video_reminders
         (task_id, earliest_video_date, required_days, actual_days, reminder_date, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
        params![
            task_id,
            fmt_date(earliest_date),
            required_days,
            actual_days,
            fmt_date(reminder_date),
            now_ts()
        ],
    )
    .map_err(db_err)?;
    Ok(conn.last_insert_rowid())
}

/// Promote every pending reminder due on or before `today` to notified.
/// Returns the number of rows promoted. Idempotent: already-notified and
/// completed rows are excluded by the status filter.
pub fn sweep_due(conn: &Connection, today: NaiveDate) -> Result<usize> {
    conn.execute(
        "UPDATE video_reminders SET status = 'notified', notified_at = ?1
         WHERE status = 'pending' AND reminder_date <= ?2",
        params![now_ts(), fmt_date(today)],
    )
    .map_err(db_err)
}

/// Mark a reminder completed. Unconditional terminal update; re-completing
/// just overwrites the same terminal values.
pub fn complete_reminder(conn: &Connection, reminder_id: i64, actor: &str) -> Result<()> {
    let n = conn
        .execute(
            "UPDATE video_reminders SET status = 'completed', completed_at = ?1, completed_by = ?2
             WHERE id = ?3",
            params![now_ts(), actor, reminder_id],
        )
        .map_err(db_err)?;
    if n == 0 {
        return Err(AuditError::not_found(format!("reminder {reminder_id}")));
    }
    Ok(())
}

/// Hard-delete the given reminders. No cascading side effects.
pub fn delete_reminders(conn: &Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    conn.execute(
        &format!("DELETE FROM video_reminders WHERE id IN ({placeholders})"),
        params_from_iter(ids.iter()),
    )
    .map_err(db_err)
}

/// Number of active reminders attached to a task.
pub fn active_reminder_count(conn: &Connection, task_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM video_reminders WHERE task_id = ?1 AND status != 'completed'",
        params![task_id],
        |r| r.get(0),
    )
    .map_err(db_err)
}

fn map_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoReminder> {
    let earliest: String = row.get(2)?;
    let due: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(VideoReminder {
        id: row.get(0)?,
        task_id: row.get(1)?,
        earliest_video_date: parse_date(&earliest)?,
        required_days: row.get(3)?,
        actual_days: row.get(4)?,
        reminder_date: parse_date(&due)?,
        status: status.parse().map_err(conv_err)?,
        created_at: row.get(7)?,
        notified_at: row.get(8)?,
        completed_at: row.get(9)?,
        completed_by: row.get(10)?,
        file_name: row.get(11)?,
        organization: row.get(12)?,
    })
}

/// Fetch a single reminder (joined with its task, when it still exists).
pub fn get_reminder(conn: &Connection, reminder_id: i64) -> Result<Option<VideoReminder>> {
    conn.query_row(
        "SELECT vr.id, vr.task_id, vr.earliest_video_date, vr.required_days, vr.actual_days,
                vr.reminder_date, vr.status, vr.created_at, vr.notified_at, vr.completed_at,
                vr.completed_by, at.file_name, at.organization
         FROM video_reminders vr
         LEFT JOIN audit_tasks at ON vr.task_id = at.id
         WHERE vr.id = ?1",
        params![reminder_id],
        map_reminder,
    )
    .optional()
    .map_err(db_err)
}

/// Paginated reminder listing, soonest due first, optionally filtered by
/// status. Returns (rows, total matching count).
pub fn list_reminders(
    conn: &Connection,
    status: Option<ReminderStatus>,
    page: i64,
    page_size: i64,
) -> Result<(Vec<VideoReminder>, i64)> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 500);
    let offset = (page - 1) * page_size;

    let (total, rows) = match status {
        Some(s) => {
            let total: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM video_reminders vr WHERE vr.status = ?1",
                    params![s.as_str()],
                    |r| r.get(0),
                )
                .map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT vr.id, vr.task_id, vr.earliest_video_date, vr.required_days, vr.actual_days,
                            vr.reminder_date, vr.status, vr.created_at, vr.notified_at, vr.completed_at,
                            vr.completed_by, at.file_name, at.organization
                     FROM video_reminders vr
                     LEFT JOIN audit_tasks at ON vr.task_id = at.id
                     WHERE vr.status = ?1
                     ORDER BY vr.reminder_date ASC, vr.created_at DESC
                     LIMIT ?2 OFFSET ?3",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![s.as_str(), page_size, offset], map_reminder)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            (total, rows)
        }
        None => {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM video_reminders", [], |r| r.get(0))
                .map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT vr.id, vr.task_id, vr.earliest_video_date, vr.required_days, vr.actual_days,
                            vr.reminder_date, vr.status, vr.created_at, vr.notified_at, vr.completed_at,
                            vr.completed_by, at.file_name, at.organization
                     FROM video_reminders vr
                     LEFT JOIN audit_tasks at ON vr.task_id = at.id
                     ORDER BY vr.reminder_date ASC, vr.created_at DESC
                     LIMIT ?1 OFFSET ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![page_size, offset], map_reminder)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            (total, rows)
        }
    };
    Ok((rows, total))
}

/// Load the most recently saved schedule config, enabled or not.
pub fn load_schedule_config(conn: &Connection) -> Result<Option<ScheduleConfig>> {
    conn.query_row(
        "SELECT frequency, hour, day_of_week, enabled, updated_by
         FROM schedule_config ORDER BY id DESC LIMIT 1",
        [],
        |row| {
            let freq: String = row.get(0)?;
            Ok(ScheduleConfig {
                frequency: freq.parse().map_err(conv_err)?,
                hour: row.get(1)?,
                day_of_week: row.get(2)?,
                enabled: row.get::<_, i64>(3)? != 0,
                updated_by: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

/// Save the schedule config as a hard singleton: delete all prior rows,
/// then insert the new one.
pub fn save_schedule_config(conn: &Connection, cfg: &ScheduleConfig) -> Result<()> {
    conn.execute("DELETE FROM schedule_config", [])
        .map_err(db_err)?;
    conn.execute(
        "INSERT INTO schedule_config (frequency, hour, day_of_week, enabled, updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            cfg.frequency.as_str(),
            cfg.hour,
            cfg.day_of_week,
            cfg.enabled as i64,
            now_ts(),
            cfg.updated_by
        ],
    )
    .map_err(db_err)?;
    Ok(())
}
