use super::{Monitor, RunGate};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Run a pass every `period`, first one immediately. Ticks that find a run
/// in flight are skipped.
pub fn spawn_scheduler(monitor: Arc<Monitor>, gate: RunGate, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "scheduler started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(_permit) = gate.try_enter() else {
                warn!("scheduled run skipped, previous run still in progress");
                continue;
            };

            if let Err(e) = monitor.run(false, Utc::now()).await {
                error!(error = %e, "scheduled monitoring run failed");
            }
        }
    })
}
