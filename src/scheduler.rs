//! scheduler.rs — recurring daily trigger for the monitor cycle.
//!
//! Process-wide state with an explicit start/stop lifecycle so tests can
//! call `Monitor::run_cycle` directly with the scheduler never engaged.
//! The spawned task invokes the exact same entry point as the manual
//! trigger; there is no duplicated cycle logic here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use metrics::counter;
use tokio::task::JoinHandle;

use crate::monitor::Monitor;

#[derive(Default)]
pub struct Scheduler {
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the daily loop firing at `hour_utc` (0-23). Restarting replaces
    /// the previous loop.
    pub fn start(&mut self, monitor: Arc<Monitor>, hour_utc: u32) {
        self.stop();
        let handle = tokio::spawn(async move {
            loop {
                let wait = duration_until_hour(Utc::now(), hour_utc);
                tracing::info!(
                    target: "scheduler",
                    wait_secs = wait.as_secs(),
                    hour_utc,
                    "sleeping until next scheduled cycle"
                );
                tokio::time::sleep(wait).await;

                counter!("scheduler_runs_total").increment(1);
                let result = monitor.run_cycle().await;
                tracing::info!(
                    target: "scheduler",
                    changes = result.changes.len(),
                    notification = ?result.notification,
                    "scheduled cycle finished"
                );
            }
        });
        self.handle = Some(handle);
    }

    pub fn stop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Time to sleep from `now` until the next occurrence of `hour_utc:00:00`.
pub fn duration_until_hour(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let hour = hour_utc.min(23);
    let today = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("valid wall-clock hour")
        .and_utc();
    let next = if today > now {
        today
    } else {
        today + Days::new(1)
    };
    (next - now).to_std().unwrap_or_default()
}
