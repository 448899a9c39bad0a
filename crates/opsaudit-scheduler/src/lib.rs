//! Periodic reminder sweeps driven by a persisted schedule config.

pub mod runner;

pub use runner::{ScheduleRunner, compute_next_run};
