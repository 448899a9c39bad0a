//! Domain enums shared across the workspace.
//!
//! Every enum round-trips through its storage TEXT form via
//! `Display`/`FromStr`; unknown strings surface as validation errors so bad
//! input is rejected before any row is touched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Review state of an audit task.
///
/// The nominal flow is Unreviewed → NeedsFix → Completed, but any move is
/// accepted — the model reacts to the resulting value, it does not forbid
/// out-of-order transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Unreviewed,
    NeedsFix,
    Completed,
}

impl AuditStatus {
    /// Numeric status code cascaded onto child detail rows.
    pub fn detail_code(self) -> i64 {
        match self {
            AuditStatus::Unreviewed => 0,
            AuditStatus::NeedsFix => 1,
            AuditStatus::Completed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Unreviewed => "unreviewed",
            AuditStatus::NeedsFix => "needs_fix",
            AuditStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unreviewed" => Ok(AuditStatus::Unreviewed),
            "needs_fix" => Ok(AuditStatus::NeedsFix),
            "completed" => Ok(AuditStatus::Completed),
            other => Err(AuditError::validation(format!(
                "invalid audit status: '{other}'"
            ))),
        }
    }
}

/// Outcome of a spot-check (sample) on a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleResult {
    Pass,
    NeedsFix,
}

impl SampleResult {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleResult::Pass => "pass",
            SampleResult::NeedsFix => "needs_fix",
        }
    }
}

impl fmt::Display for SampleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleResult {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(SampleResult::Pass),
            "needs_fix" => Ok(SampleResult::NeedsFix),
            other => Err(AuditError::validation(format!(
                "invalid sample result: '{other}'"
            ))),
        }
    }
}

/// Lifecycle of a video-retention reminder.
///
/// A reminder is "active" while it is not Completed; the active set is what
/// the per-key uniqueness invariant is enforced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Notified,
    Completed,
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Notified => "notified",
            ReminderStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReminderStatus::Pending),
            "notified" => Ok(ReminderStatus::Notified),
            "completed" => Ok(ReminderStatus::Completed),
            other => Err(AuditError::validation(format!(
                "invalid reminder status: '{other}'"
            ))),
        }
    }
}

/// Sweep schedule frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(AuditError::validation(format!(
                "invalid frequency: '{other}'"
            ))),
        }
    }
}
