//! The audit-task state machine.
//!
//! Every mutation runs as one storage transaction; the matching hub event is
//! broadcast only after the commit, best-effort — a dropped event never
//! fails the request, viewers just miss one notification.

use std::sync::Arc;

use chrono::Local;
use opsaudit_core::error::{AuditError, Result};
use opsaudit_core::model::{AuditStatus, SampleResult};
use opsaudit_db::model::{AuditTask, HistoryEntry, SampleRecord};
use opsaudit_db::{AuditDb, tasks};
use opsaudit_hub::HubHandle;

use crate::extract::extract_video_retention;
use crate::reminder;

/// The workflow service. One instance, injected wherever transitions are
/// triggered (no globals).
pub struct AuditWorkflow {
    db: Arc<AuditDb>,
    hub: HubHandle,
}

impl AuditWorkflow {
    pub fn new(db: Arc<AuditDb>, hub: HubHandle) -> Self {
        Self { db, hub }
    }

    pub fn db(&self) -> &AuditDb {
        &self.db
    }

    fn check_id(task_id: i64) -> Result<()> {
        if task_id <= 0 {
            return Err(AuditError::validation(format!("invalid task id: {task_id}")));
        }
        Ok(())
    }

    /// Import one task (the row-level core of the spreadsheet import
    /// pipeline). Detail rows start Unreviewed.
    pub fn create_task(
        &self,
        file_name: &str,
        organization: &str,
        archive_type: &str,
        details: &[String],
    ) -> Result<AuditTask> {
        if file_name.trim().is_empty() {
            return Err(AuditError::validation("file name must not be empty"));
        }
        let task = self.db.with_tx(|tx| {
            let id = tasks::insert_task(tx, file_name.trim(), organization.trim(), archive_type)?;
            for item in details {
                tasks::insert_detail(tx, id, item)?;
            }
            tasks::get_task(tx, id)?
                .ok_or_else(|| AuditError::storage("task vanished within its own transaction"))
        })?;
        self.hub.task_created(
            task.id,
            serde_json::json!({
                "file_name": task.file_name,
                "organization": task.organization,
            }),
        );
        Ok(task)
    }

    /// Apply a review transition: new status and/or comment.
    ///
    /// Order inside the transaction is load-bearing:
    /// 1. read the task's current comment/status;
    /// 2. if either differs from the incoming values, append a history
    ///    entry carrying the PRE-update comment/status (the trail records
    ///    what the task changed FROM);
    /// 3. update the task row;
    /// 4. cascade the status code to child detail rows;
    /// 5. parse the comment for a retention shortfall and create a reminder
    ///    (a miss is silent).
    /// A `task_updated` event goes out after the commit.
    pub fn set_status(
        &self,
        task_id: i64,
        new_status: AuditStatus,
        comment: &str,
        actor: &str,
    ) -> Result<()> {
        Self::check_id(task_id)?;
        let comment = comment.trim();

        self.db.with_tx(|tx| {
            let (prior_comment, prior_status) = tasks::audit_state(tx, task_id)?
                .ok_or_else(|| AuditError::not_found(format!("task {task_id}")))?;

            let prior_comment_str = prior_comment.as_deref().unwrap_or("");
            if prior_comment_str != comment || prior_status != new_status {
                tasks::insert_history(tx, task_id, prior_comment.as_deref(), prior_status, actor)?;
            }

            let stored_comment = (!comment.is_empty()).then_some(comment);
            tasks::update_task_review(tx, task_id, stored_comment, new_status)?;
            tasks::cascade_detail_status(tx, task_id, new_status)?;

            if !comment.is_empty() {
                match extract_video_retention(comment) {
                    Some(issue) => {
                        reminder::create(
                            tx,
                            task_id,
                            issue.earliest_date,
                            issue.required_days,
                            Local::now().date_naive(),
                        )?;
                    }
                    None => {
                        // Not an error. Log near-misses for diagnostics.
                        if comment.contains("录像") && comment.contains("不足") {
                            tracing::debug!(
                                task_id,
                                comment,
                                "comment mentions retention but did not parse"
                            );
                        }
                    }
                }
            }
            Ok(())
        })?;

        self.hub.task_updated(
            task_id,
            serde_json::json!({
                "audit_status": new_status,
                "audit_comment": comment,
                "updated_by": actor,
            }),
        );
        Ok(())
    }

    /// Record a spot-check on a completed task.
    pub fn save_sample(
        &self,
        task_id: i64,
        sampled_by: &str,
        comment: &str,
        result: SampleResult,
    ) -> Result<()> {
        Self::check_id(task_id)?;
        self.db.with_tx(|tx| {
            let (_, status) = tasks::audit_state(tx, task_id)?
                .ok_or_else(|| AuditError::not_found(format!("task {task_id}")))?;
            if status != AuditStatus::Completed {
                return Err(AuditError::validation(
                    "only completed tasks can be spot-checked",
                ));
            }
            tasks::insert_sample(tx, task_id, sampled_by, comment.trim(), result)?;
            tasks::set_sampled(tx, task_id, true)
        })?;

        self.hub.task_sampled(
            task_id,
            serde_json::json!({
                "sample_result": result,
                "sample_comment": comment.trim(),
                "sampled_by": sampled_by,
            }),
        );
        Ok(())
    }

    /// Clear the sampled flag after a failed spot-check has been remediated.
    /// Only valid while the task is Completed and its latest sample result
    /// is NeedsFix; the task stays Completed, awaiting a resample.
    pub fn mark_fixed(&self, task_id: i64) -> Result<()> {
        Self::check_id(task_id)?;
        self.db.with_tx(|tx| {
            let (_, status) = tasks::audit_state(tx, task_id)?
                .ok_or_else(|| AuditError::not_found(format!("task {task_id}")))?;
            if status != AuditStatus::Completed {
                return Err(AuditError::validation(
                    "task must be completed to mark it fixed",
                ));
            }
            if tasks::latest_sample_result(tx, task_id)? != Some(SampleResult::NeedsFix) {
                return Err(AuditError::validation(
                    "latest sample result must be needs_fix to mark fixed",
                ));
            }
            tasks::set_sampled(tx, task_id, false)
        })?;

        self.hub.refresh();
        Ok(())
    }

    /// Remove a task and its dependent rows (history → samples → details →
    /// task). Reminders are not cascaded; the reminder list tolerates
    /// orphans.
    pub fn delete_task(&self, task_id: i64) -> Result<()> {
        Self::check_id(task_id)?;
        self.db.with_tx(|tx| tasks::delete_task_cascade(tx, task_id))?;
        self.hub.task_deleted(task_id);
        Ok(())
    }

    pub fn get_task(&self, task_id: i64) -> Result<AuditTask> {
        Self::check_id(task_id)?;
        self.db
            .with_conn(|c| tasks::get_task(c, task_id))?
            .ok_or_else(|| AuditError::not_found(format!("task {task_id}")))
    }

    /// Review history, newest first.
    pub fn history(&self, task_id: i64) -> Result<Vec<HistoryEntry>> {
        Self::check_id(task_id)?;
        self.db.with_conn(|c| tasks::list_history(c, task_id))
    }

    /// Spot-check history, newest first.
    pub fn samples(&self, task_id: i64) -> Result<Vec<SampleRecord>> {
        Self::check_id(task_id)?;
        self.db.with_conn(|c| tasks::list_samples(c, task_id))
    }
}
