//! # OpsAudit Workflow
//!
//! The engine room of the tracker:
//! - [`extract`] — pulls retention shortfalls out of free-text audit
//!   comments with ordered pattern tables;
//! - [`reminder`] — reminder lifecycle: create (deduped, transactional),
//!   sweep, complete, delete;
//! - [`workflow`] — the task state machine: status transitions with
//!   pre-change history snapshots, detail cascade, sample records, and
//!   post-commit event broadcast.

pub mod extract;
pub mod reminder;
pub mod workflow;

pub use extract::{RetentionIssue, extract_video_retention};
pub use workflow::AuditWorkflow;
