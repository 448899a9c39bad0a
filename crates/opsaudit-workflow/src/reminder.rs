//! Reminder lifecycle: create / sweep / complete / delete.
//!
//! Creation runs on the caller's transaction so a reminder is committed (or
//! rolled back) together with the workflow transition that produced it. The
//! sweep is what the schedule runner fires; everything here is idempotent or
//! terminal, so repeated calls are safe.

use chrono::{Local, NaiveDate};
use opsaudit_core::error::Result;
use opsaudit_core::model::ReminderStatus;
use opsaudit_db::model::VideoReminder;
use opsaudit_db::{AuditDb, reminders};
use rusqlite::Connection;

/// Create a pending reminder for a retention shortfall.
///
/// `actual_days` is how much footage actually exists as of the audit date;
/// `reminder_date` is when the required span will have elapsed. If an active
/// reminder already exists for the same (task, earliest date, span) key this
/// is a logged no-op, not an error. Returns whether a row was inserted.
pub fn create(
    conn: &Connection,
    task_id: i64,
    earliest_date: NaiveDate,
    required_days: i64,
    audit_date: NaiveDate,
) -> Result<bool> {
    let actual_days = (audit_date - earliest_date).num_days().max(0);
    let reminder_date = earliest_date + chrono::Duration::days(required_days);

    if reminders::active_reminder_exists(conn, task_id, earliest_date, required_days)? {
        tracing::info!(
            task_id,
            %earliest_date,
            required_days,
            "active reminder already exists, skipping create"
        );
        return Ok(false);
    }

    let id = reminders::insert_reminder(
        conn,
        task_id,
        earliest_date,
        required_days,
        actual_days,
        reminder_date,
    )?;
    tracing::info!(
        reminder_id = id,
        task_id,
        %earliest_date,
        required_days,
        %reminder_date,
        "reminder created"
    );
    Ok(true)
}

/// Promote every due pending reminder to notified. Returns the count.
pub fn sweep(db: &AuditDb) -> Result<usize> {
    let today = Local::now().date_naive();
    let n = db.with_conn(|c| reminders::sweep_due(c, today))?;
    if n > 0 {
        tracing::info!("reminder sweep promoted {n} reminders to notified");
    }
    Ok(n)
}

/// Mark a reminder completed by `actor`.
pub fn complete(db: &AuditDb, reminder_id: i64, actor: &str) -> Result<()> {
    db.with_conn(|c| reminders::complete_reminder(c, reminder_id, actor))?;
    tracing::info!(reminder_id, actor, "reminder completed");
    Ok(())
}

/// Hard-delete the given reminders. Returns how many rows went away.
pub fn delete(db: &AuditDb, ids: &[i64]) -> Result<usize> {
    let n = db.with_conn(|c| reminders::delete_reminders(c, ids))?;
    tracing::info!("deleted {n} reminders");
    Ok(n)
}

/// Paginated listing for the reminder screen.
pub fn list(
    db: &AuditDb,
    status: Option<ReminderStatus>,
    page: i64,
    page_size: i64,
) -> Result<(Vec<VideoReminder>, i64)> {
    db.with_conn(|c| reminders::list_reminders(c, status, page, page_size))
}

/// Active reminder count for one task (shown as a badge in task lists).
pub fn count_for_task(db: &AuditDb, task_id: i64) -> Result<i64> {
    db.with_conn(|c| reminders::active_reminder_count(c, task_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsaudit_db::tasks::insert_task;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_create_computes_derived_fields() {
        let db = AuditDb::open_in_memory().unwrap();
        let task = db.with_tx(|tx| insert_task(tx, "f.xlsx", "org", "")).unwrap();
        db.with_tx(|tx| create(tx, task, date("2024-01-01"), 30, date("2024-01-20")))
            .unwrap();

        let (rows, _) = list(&db, None, 1, 10).unwrap();
        let r = &rows[0];
        assert_eq!(r.earliest_video_date, date("2024-01-01"));
        assert_eq!(r.required_days, 30);
        assert_eq!(r.actual_days, 19);
        assert_eq!(r.reminder_date, date("2024-01-31"));
        assert_eq!(r.status, ReminderStatus::Pending);
    }

    #[test]
    fn test_actual_days_clamped_at_zero() {
        // Audit date before the earliest recording date.
        let db = AuditDb::open_in_memory().unwrap();
        let task = db.with_tx(|tx| insert_task(tx, "f.xlsx", "org", "")).unwrap();
        db.with_tx(|tx| create(tx, task, date("2024-02-01"), 90, date("2024-01-20")))
            .unwrap();
        let (rows, _) = list(&db, None, 1, 10).unwrap();
        assert_eq!(rows[0].actual_days, 0);
    }

    #[test]
    fn test_duplicate_active_key_is_a_noop() {
        let db = AuditDb::open_in_memory().unwrap();
        let task = db.with_tx(|tx| insert_task(tx, "f.xlsx", "org", "")).unwrap();
        let first = db
            .with_tx(|tx| create(tx, task, date("2024-01-01"), 30, date("2024-01-20")))
            .unwrap();
        let second = db
            .with_tx(|tx| create(tx, task, date("2024-01-01"), 30, date("2024-01-25")))
            .unwrap();
        assert!(first);
        assert!(!second);
        let (_, total) = list(&db, None, 1, 10).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_completed_reminder_frees_the_key() {
        let db = AuditDb::open_in_memory().unwrap();
        let task = db.with_tx(|tx| insert_task(tx, "f.xlsx", "org", "")).unwrap();
        db.with_tx(|tx| create(tx, task, date("2024-01-01"), 30, date("2024-01-20")))
            .unwrap();
        let (rows, _) = list(&db, None, 1, 10).unwrap();
        complete(&db, rows[0].id, "auditor").unwrap();

        // The key is no longer active, so a fresh reminder may be created.
        let created = db
            .with_tx(|tx| create(tx, task, date("2024-01-01"), 30, date("2024-03-01")))
            .unwrap();
        assert!(created);
        assert_eq!(count_for_task(&db, task).unwrap(), 1);
    }

    #[test]
    fn test_different_spans_are_distinct_keys() {
        let db = AuditDb::open_in_memory().unwrap();
        let task = db.with_tx(|tx| insert_task(tx, "f.xlsx", "org", "")).unwrap();
        db.with_tx(|tx| create(tx, task, date("2024-01-01"), 30, date("2024-01-20")))
            .unwrap();
        db.with_tx(|tx| create(tx, task, date("2024-01-01"), 90, date("2024-01-20")))
            .unwrap();
        assert_eq!(count_for_task(&db, task).unwrap(), 2);
    }
}
