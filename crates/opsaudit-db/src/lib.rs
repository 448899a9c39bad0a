//! # OpsAudit Storage
//!
//! SQLite persistence for audit tasks, detail rows, history snapshots,
//! sample records, video reminders, and the schedule-config singleton.
//!
//! One `Connection` behind a `Mutex`; WAL mode for concurrent readers.
//! Multi-statement workflow transitions run through [`AuditDb::with_tx`] —
//! the closure gets a live [`rusqlite::Transaction`], and an `Err` return
//! rolls the whole transition back (drop = rollback).
//!
//! This crate owns all SQL. Semantics (dedupe rules, state-machine guards,
//! event emission) live in `opsaudit-workflow`.

pub mod model;
pub mod reminders;
pub mod tasks;

use std::path::Path;
use std::sync::Mutex;

use opsaudit_core::error::{AuditError, Result};
use rusqlite::{Connection, Transaction};

pub use model::{AuditTask, HistoryEntry, SampleRecord, ScheduleConfig, VideoReminder};

/// Map a rusqlite error into the workspace storage error.
pub(crate) fn db_err(e: rusqlite::Error) -> AuditError {
    AuditError::storage(e)
}

/// Map an enum-parse failure occurring inside a row-mapping closure back
/// into a rusqlite conversion error.
pub(crate) fn conv_err(e: AuditError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

/// Current timestamp in the storage TEXT format.
pub(crate) fn now_ts() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The OpsAudit database.
pub struct AuditDb {
    conn: Mutex<Connection>,
}

impl AuditDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AuditError::storage(format!("create {}: {e}", parent.display())))?;
            }
        }
        let conn = Connection::open(path).map_err(db_err)?;
        // WAL lets the gateway keep reading while a transition commits.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .ok();
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create the schema. Idempotent.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_tasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name       TEXT NOT NULL,
                organization    TEXT NOT NULL,
                archive_type    TEXT NOT NULL DEFAULT '',
                audit_status    TEXT NOT NULL DEFAULT 'unreviewed',
                audit_comment   TEXT,
                is_sampled      INTEGER NOT NULL DEFAULT 0,
                last_sampled_at TEXT,
                import_time     TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS audit_details (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id      INTEGER NOT NULL,
                item_name    TEXT NOT NULL DEFAULT '',
                audit_status INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_details_task ON audit_details(task_id);
            CREATE TABLE IF NOT EXISTS audit_history (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id       INTEGER NOT NULL,
                audit_comment TEXT,
                audit_status  TEXT NOT NULL,
                auditor       TEXT NOT NULL,
                audit_time    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_task ON audit_history(task_id);
            CREATE TABLE IF NOT EXISTS sample_records (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id        INTEGER NOT NULL,
                sampled_by     TEXT NOT NULL,
                sample_comment TEXT NOT NULL DEFAULT '',
                sample_result  TEXT NOT NULL,
                sampled_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_samples_task ON sample_records(task_id);
            CREATE TABLE IF NOT EXISTS video_reminders (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id             INTEGER NOT NULL,
                earliest_video_date TEXT NOT NULL,
                required_days       INTEGER NOT NULL,
                actual_days         INTEGER NOT NULL,
                reminder_date       TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'pending',
                created_at          TEXT NOT NULL,
                notified_at         TEXT,
                completed_at        TEXT,
                completed_by        TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_reminders_due ON video_reminders(status, reminder_date);
            CREATE TABLE IF NOT EXISTS schedule_config (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                frequency   TEXT NOT NULL,
                hour        INTEGER NOT NULL,
                day_of_week INTEGER,
                enabled     INTEGER NOT NULL DEFAULT 1,
                updated_at  TEXT NOT NULL,
                updated_by  TEXT
            );",
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AuditError::storage(format!("connection lock poisoned: {e}")))
    }

    /// Run `f` inside a transaction; commit on `Ok`, roll back on `Err`.
    pub fn with_tx<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let out = f(&tx)?;
        tx.commit().map_err(db_err)?;
        Ok(out)
    }

    /// Run `f` with the raw connection (single-statement reads/writes).
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let db = AuditDb::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.with_conn(|c| {
            let n: i64 = c
                .query_row("SELECT COUNT(*) FROM audit_tasks", [], |r| r.get(0))
                .map_err(db_err)?;
            assert_eq!(n, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let db = AuditDb::open_in_memory().unwrap();
        let res: Result<()> = db.with_tx(|tx| {
            tasks::insert_task(tx, "a.xlsx", "org", "")?;
            Err(opsaudit_core::AuditError::validation("boom"))
        });
        assert!(res.is_err());
        let count = db
            .with_conn(|c| {
                c.query_row("SELECT COUNT(*) FROM audit_tasks", [], |r| r.get::<_, i64>(0))
                    .map_err(db_err)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
