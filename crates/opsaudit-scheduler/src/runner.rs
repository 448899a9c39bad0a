//! The schedule runner: computes the next fire time from the persisted
//! frequency/hour/weekday config, sleeps, and runs the reminder sweep.
//!
//! One long-lived loop per runner. After firing it sleeps a FIXED full
//! cycle (24h daily, 7×24h weekly) before re-reading the configuration —
//! a config change saved mid-cycle only takes effect through an explicit
//! [`ScheduleRunner::reload`], which stops the old loop and waits for it to
//! confirm exit (join) before starting the new one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use opsaudit_core::error::{AuditError, Result};
use opsaudit_core::model::Frequency;
use opsaudit_db::model::ScheduleConfig;
use opsaudit_db::{AuditDb, reminders};
use opsaudit_workflow::reminder;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

/// How often a disabled runner re-checks its configuration.
const DISABLED_POLL: Duration = Duration::from_secs(60);

/// Compute the next fire time for a schedule config.
///
/// Daily: today at `hour` if that is still ahead of (or exactly) `now`,
/// otherwise tomorrow at `hour`. Weekly: the next occurrence of
/// `day_of_week` (1 = Monday .. 7 = Sunday) at `hour`; when today IS the
/// target weekday but `hour` has already passed, a full 7 days ahead.
/// `hour == 24` normalizes to midnight of the following day.
pub fn compute_next_run(cfg: &ScheduleConfig, now: NaiveDateTime) -> NaiveDateTime {
    let today_at = at_hour(now.date(), cfg.hour);
    match cfg.frequency {
        Frequency::Daily => {
            if today_at >= now {
                today_at
            } else {
                today_at + chrono::Duration::days(1)
            }
        }
        Frequency::Weekly => {
            let target = cfg.day_of_week.unwrap_or(1).clamp(1, 7) as i64;
            let current = now.weekday().number_from_monday() as i64;
            let mut days_until = (target - current + 7) % 7;
            if days_until == 0 && today_at < now {
                days_until = 7;
            }
            today_at + chrono::Duration::days(days_until)
        }
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    if hour >= 24 {
        (date + chrono::Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
    } else {
        date.and_hms_opt(hour, 0, 0).expect("whole hour is always valid")
    }
}

fn describe(cfg: &ScheduleConfig) -> String {
    match cfg.frequency {
        Frequency::Daily => format!("daily at {:02}:00", cfg.hour),
        Frequency::Weekly => format!(
            "weekly on day {} at {:02}:00",
            cfg.day_of_week.unwrap_or(1),
            cfg.hour
        ),
    }
}

struct RunnerTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the sweep loop. Construct once at startup, share via `Arc`.
pub struct ScheduleRunner {
    db: Arc<AuditDb>,
    active: Mutex<Option<RunnerTask>>,
}

impl ScheduleRunner {
    pub fn new(db: Arc<AuditDb>) -> Self {
        Self {
            db,
            active: Mutex::new(None),
        }
    }

    /// Start the loop if it is not already running.
    pub async fn start(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return;
        }
        *active = Some(spawn_loop(self.db.clone()));
        tracing::info!("⏰ reminder schedule runner started");
    }

    /// Restart the loop with fresh configuration. The old loop is told to
    /// stop and must acknowledge (join) before the new one starts, so two
    /// loops never run at once.
    pub async fn reload(&self) {
        let mut active = self.active.lock().await;
        if let Some(task) = active.take() {
            let _ = task.stop.send(());
            if let Err(e) = task.handle.await {
                tracing::warn!("old schedule loop ended abnormally: {e}");
            }
        }
        *active = Some(spawn_loop(self.db.clone()));
        tracing::info!("⏰ reminder schedule runner reloaded");
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if let Some(task) = active.take() {
            let _ = task.stop.send(());
            let _ = task.handle.await;
            tracing::info!("reminder schedule runner stopped");
        }
    }

    /// Current persisted config, or the hard-coded default when none is
    /// stored.
    pub fn load_config(&self) -> Result<ScheduleConfig> {
        Ok(self
            .db
            .with_conn(reminders::load_schedule_config)?
            .unwrap_or_default())
    }

    /// Validate and persist a new schedule config (hard singleton), then
    /// restart the loop so it takes effect immediately.
    pub async fn save_config(&self, mut cfg: ScheduleConfig) -> Result<()> {
        if !(1..=24).contains(&cfg.hour) {
            return Err(AuditError::validation(format!("invalid hour: {}", cfg.hour)));
        }
        match cfg.frequency {
            Frequency::Weekly => {
                let dow = cfg
                    .day_of_week
                    .ok_or_else(|| AuditError::validation("weekly schedule needs day_of_week"))?;
                if !(1..=7).contains(&dow) {
                    return Err(AuditError::validation(format!("invalid day_of_week: {dow}")));
                }
            }
            Frequency::Daily => cfg.day_of_week = None,
        }
        self.db
            .with_conn(|c| reminders::save_schedule_config(c, &cfg))?;
        tracing::info!("schedule config saved: {}", describe(&cfg));
        self.reload().await;
        Ok(())
    }
}

fn spawn_loop(db: Arc<AuditDb>) -> RunnerTask {
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(run_loop(db, stop_rx));
    RunnerTask {
        stop: stop_tx,
        handle,
    }
}

async fn run_loop(db: Arc<AuditDb>, mut stop: oneshot::Receiver<()>) {
    loop {
        let cfg = match db.with_conn(reminders::load_schedule_config) {
            Ok(Some(cfg)) => cfg,
            Ok(None) => ScheduleConfig::default(),
            Err(e) => {
                tracing::error!("loading schedule config failed, using default: {e}");
                ScheduleConfig::default()
            }
        };

        if !cfg.enabled {
            tracing::debug!("schedule disabled, re-checking in {DISABLED_POLL:?}");
            if wait_or_stop(&mut stop, DISABLED_POLL).await {
                return;
            }
            continue;
        }

        let now = Local::now().naive_local();
        let next = compute_next_run(&cfg, now);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tracing::info!("🔔 next reminder sweep: {next} ({})", describe(&cfg));
        if wait_or_stop(&mut stop, wait).await {
            return;
        }

        match reminder::sweep(&db) {
            Ok(n) => tracing::info!("reminder sweep done, {n} promoted"),
            Err(e) => tracing::error!("reminder sweep failed: {e}"),
        }

        // Fixed re-sleep: the live config is not consulted again until the
        // cycle elapses (or a reload interrupts).
        let cycle = match cfg.frequency {
            Frequency::Daily => Duration::from_secs(24 * 60 * 60),
            Frequency::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
        };
        if wait_or_stop(&mut stop, cycle).await {
            return;
        }
    }
}

/// Sleep for `dur`, returning true if the stop signal fired first (or the
/// runner handle was dropped).
async fn wait_or_stop(stop: &mut oneshot::Receiver<()>, dur: Duration) -> bool {
    tokio::select! {
        _ = &mut *stop => true,
        _ = tokio::time::sleep(dur) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(frequency: Frequency, hour: u32, day_of_week: Option<u32>) -> ScheduleConfig {
        ScheduleConfig {
            frequency,
            hour,
            day_of_week,
            enabled: true,
            updated_by: None,
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_daily_before_hour_runs_today() {
        let next = compute_next_run(&cfg(Frequency::Daily, 2, None), dt("2024-06-10 01:00"));
        assert_eq!(next, dt("2024-06-10 02:00"));
    }

    #[test]
    fn test_daily_after_hour_rolls_to_tomorrow() {
        let next = compute_next_run(&cfg(Frequency::Daily, 2, None), dt("2024-06-10 03:00"));
        assert_eq!(next, dt("2024-06-11 02:00"));
    }

    #[test]
    fn test_daily_exactly_at_hour_runs_now() {
        let next = compute_next_run(&cfg(Frequency::Daily, 2, None), dt("2024-06-10 02:00"));
        assert_eq!(next, dt("2024-06-10 02:00"));
    }

    #[test]
    fn test_weekly_same_day_before_hour() {
        // 2024-06-12 is a Wednesday (day 3).
        let next = compute_next_run(&cfg(Frequency::Weekly, 1, Some(3)), dt("2024-06-12 00:30"));
        assert_eq!(next, dt("2024-06-12 01:00"));
    }

    #[test]
    fn test_weekly_same_day_after_hour_rolls_a_week() {
        let next = compute_next_run(&cfg(Frequency::Weekly, 1, Some(3)), dt("2024-06-12 02:00"));
        assert_eq!(next, dt("2024-06-19 01:00"));
    }

    #[test]
    fn test_weekly_target_later_this_week() {
        // From Wednesday to Friday (day 5).
        let next = compute_next_run(&cfg(Frequency::Weekly, 9, Some(5)), dt("2024-06-12 12:00"));
        assert_eq!(next, dt("2024-06-14 09:00"));
    }

    #[test]
    fn test_weekly_target_wraps_to_next_week() {
        // From Wednesday back to Monday (day 1).
        let next = compute_next_run(&cfg(Frequency::Weekly, 9, Some(1)), dt("2024-06-12 12:00"));
        assert_eq!(next, dt("2024-06-17 09:00"));
    }

    #[test]
    fn test_hour_24_normalizes_to_next_midnight() {
        let next = compute_next_run(&cfg(Frequency::Daily, 24, None), dt("2024-06-10 03:00"));
        assert_eq!(next, dt("2024-06-11 00:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_and_shutdown_join_cleanly() {
        let db = Arc::new(AuditDb::open_in_memory().unwrap());
        // Disabled config keeps the loop in its poll branch.
        db.with_conn(|c| {
            reminders::save_schedule_config(
                c,
                &ScheduleConfig {
                    enabled: false,
                    ..ScheduleConfig::default()
                },
            )
        })
        .unwrap();

        let runner = ScheduleRunner::new(db);
        runner.start().await;
        runner.start().await; // idempotent
        runner.reload().await;
        runner.shutdown().await;
        assert!(runner.active.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_save_config_validates() {
        let db = Arc::new(AuditDb::open_in_memory().unwrap());
        let runner = ScheduleRunner::new(db);

        let err = runner
            .save_config(cfg(Frequency::Daily, 0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation(_)));

        let err = runner
            .save_config(cfg(Frequency::Weekly, 3, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation(_)));

        let err = runner
            .save_config(cfg(Frequency::Weekly, 3, Some(8)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Validation(_)));

        // Valid daily config saves, clears day_of_week, and starts a loop.
        runner
            .save_config(cfg(Frequency::Daily, 2, Some(5)))
            .await
            .unwrap();
        let loaded = runner.load_config().unwrap();
        assert_eq!(loaded.hour, 2);
        assert!(loaded.day_of_week.is_none());
        runner.shutdown().await;
    }
}
