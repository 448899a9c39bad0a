//! SQL operations on tasks, detail rows, history snapshots, and samples.
//!
//! Functions take `&Connection`; a `Transaction` derefs to one, so the same
//! helpers compose inside `AuditDb::with_tx` closures.

use opsaudit_core::error::{AuditError, Result};
use opsaudit_core::model::{AuditStatus, SampleResult};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{AuditTask, HistoryEntry, SampleRecord};
use crate::{conv_err, db_err, now_ts};

/// Insert a new task in the Unreviewed state. Returns the new id.
pub fn insert_task(
    conn: &Connection,
    file_name: &str,
    organization: &str,
    archive_type: &str,
) -> Result<i64> {
    let ts = now_ts();
    conn.execute(
        "INSERT INTO audit_tasks (file_name, organization, archive_type, audit_status, import_time, updated_at)
         VALUES (?1, ?2, ?3, 'unreviewed', ?4, ?4)",
        params![file_name, organization, archive_type, ts],
    )
    .map_err(db_err)?;
    Ok(conn.last_insert_rowid())
}

/// Insert a child detail row for a task.
pub fn insert_detail(conn: &Connection, task_id: i64, item_name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO audit_details (task_id, item_name, audit_status) VALUES (?1, ?2, 0)",
        params![task_id, item_name],
    )
    .map_err(db_err)?;
    Ok(conn.last_insert_rowid())
}

fn map_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditTask> {
    let status: String = row.get(4)?;
    Ok(AuditTask {
        id: row.get(0)?,
        file_name: row.get(1)?,
        organization: row.get(2)?,
        archive_type: row.get(3)?,
        audit_status: status.parse().map_err(conv_err)?,
        audit_comment: row.get(5)?,
        is_sampled: row.get::<_, i64>(6)? != 0,
        last_sampled_at: row.get(7)?,
        import_time: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const TASK_COLS: &str = "id, file_name, organization, archive_type, audit_status, audit_comment, \
                         is_sampled, last_sampled_at, import_time, updated_at";

/// Fetch a task by id.
pub fn get_task(conn: &Connection, task_id: i64) -> Result<Option<AuditTask>> {
    conn.query_row(
        &format!("SELECT {TASK_COLS} FROM audit_tasks WHERE id = ?1"),
        params![task_id],
        map_task,
    )
    .optional()
    .map_err(db_err)
}

/// Read just the current (comment, status) pair of a task.
pub fn audit_state(conn: &Connection, task_id: i64) -> Result<Option<(Option<String>, AuditStatus)>> {
    conn.query_row(
        "SELECT audit_comment, audit_status FROM audit_tasks WHERE id = ?1",
        params![task_id],
        |row| {
            let status: String = row.get(1)?;
            Ok((row.get::<_, Option<String>>(0)?, status.parse().map_err(conv_err)?))
        },
    )
    .optional()
    .map_err(db_err)
}

/// Update a task's review fields. Empty comments are stored as NULL.
pub fn update_task_review(
    conn: &Connection,
    task_id: i64,
    comment: Option<&str>,
    status: AuditStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE audit_tasks SET audit_comment = ?1, audit_status = ?2, updated_at = ?3 WHERE id = ?4",
        params![comment, status.as_str(), now_ts(), task_id],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Cascade a task's status code to every child detail row.
pub fn cascade_detail_status(conn: &Connection, task_id: i64, status: AuditStatus) -> Result<()> {
    conn.execute(
        "UPDATE audit_details SET audit_status = ?1 WHERE task_id = ?2",
        params![status.detail_code(), task_id],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Status codes of a task's detail rows (test/diagnostic helper).
pub fn detail_status_codes(conn: &Connection, task_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT audit_status FROM audit_details WHERE task_id = ?1 ORDER BY id")
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![task_id], |r| r.get(0))
        .map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<i64>>>().map_err(db_err)
}

/// Append a history snapshot carrying the task's PRE-update comment/status.
pub fn insert_history(
    conn: &Connection,
    task_id: i64,
    comment: Option<&str>,
    status: AuditStatus,
    auditor: &str,
) -> Result<()> {
    // Empty prior comments are recorded as NULL, matching the task column.
    let comment = comment.filter(|c| !c.is_empty());
    conn.execute(
        "INSERT INTO audit_history (task_id, audit_comment, audit_status, auditor, audit_time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![task_id, comment, status.as_str(), auditor, now_ts()],
    )
    .map_err(db_err)?;
    Ok(())
}

/// History snapshots for a task, newest first.
pub fn list_history(conn: &Connection, task_id: i64) -> Result<Vec<HistoryEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, task_id, audit_comment, audit_status, auditor, audit_time
             FROM audit_history WHERE task_id = ?1 ORDER BY audit_time DESC, id DESC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![task_id], |row| {
            let status: String = row.get(3)?;
            Ok(HistoryEntry {
                id: row.get(0)?,
                task_id: row.get(1)?,
                audit_comment: row.get(2)?,
                audit_status: status.parse().map_err(conv_err)?,
                auditor: row.get(4)?,
                audit_time: row.get(5)?,
            })
        })
        .map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

/// Append a spot-check record.
pub fn insert_sample(
    conn: &Connection,
    task_id: i64,
    sampled_by: &str,
    comment: &str,
    result: SampleResult,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO sample_records (task_id, sampled_by, sample_comment, sample_result, sampled_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![task_id, sampled_by, comment, result.as_str(), now_ts()],
    )
    .map_err(db_err)?;
    Ok(conn.last_insert_rowid())
}

/// Set or clear a task's sampled flag. Clearing also clears the timestamp.
pub fn set_sampled(conn: &Connection, task_id: i64, sampled: bool) -> Result<()> {
    if sampled {
        conn.execute(
            "UPDATE audit_tasks SET is_sampled = 1, last_sampled_at = ?1 WHERE id = ?2",
            params![now_ts(), task_id],
        )
    } else {
        conn.execute(
            "UPDATE audit_tasks SET is_sampled = 0, last_sampled_at = NULL WHERE id = ?1",
            params![task_id],
        )
    }
    .map_err(db_err)?;
    Ok(())
}

/// The most recent sample result for a task, if any.
pub fn latest_sample_result(conn: &Connection, task_id: i64) -> Result<Option<SampleResult>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT sample_result FROM sample_records WHERE task_id = ?1
             ORDER BY sampled_at DESC, id DESC LIMIT 1",
            params![task_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)?;
    raw.map(|s| s.parse::<SampleResult>()).transpose()
}

/// Spot-check records for a task, newest first.
pub fn list_samples(conn: &Connection, task_id: i64) -> Result<Vec<SampleRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, task_id, sampled_by, sample_comment, sample_result, sampled_at
             FROM sample_records WHERE task_id = ?1 ORDER BY sampled_at DESC, id DESC",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![task_id], |row| {
            let result: String = row.get(4)?;
            Ok(SampleRecord {
                id: row.get(0)?,
                task_id: row.get(1)?,
                sampled_by: row.get(2)?,
                sample_comment: row.get(3)?,
                sample_result: result.parse().map_err(conv_err)?,
                sampled_at: row.get(5)?,
            })
        })
        .map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

/// Delete a task and its dependents, children first:
/// history → samples → details → task.
pub fn delete_task_cascade(conn: &Connection, task_id: i64) -> Result<()> {
    conn.execute("DELETE FROM audit_history WHERE task_id = ?1", params![task_id])
        .map_err(db_err)?;
    conn.execute("DELETE FROM sample_records WHERE task_id = ?1", params![task_id])
        .map_err(db_err)?;
    conn.execute("DELETE FROM audit_details WHERE task_id = ?1", params![task_id])
        .map_err(db_err)?;
    let n = conn
        .execute("DELETE FROM audit_tasks WHERE id = ?1", params![task_id])
        .map_err(db_err)?;
    if n == 0 {
        return Err(AuditError::not_found(format!("task {task_id}")));
    }
    Ok(())
}
