//! # OpsAudit Core
//!
//! Shared foundation for the OpsAudit workspace: the error taxonomy,
//! the domain enums (audit status, sample result, reminder status,
//! schedule frequency), and the TOML configuration.

pub mod config;
pub mod error;
pub mod model;

pub use config::OpsAuditConfig;
pub use error::{AuditError, Result};
pub use model::{AuditStatus, Frequency, ReminderStatus, SampleResult};
