//! Daily sweep scheduler
//!
//! Fires one sweep per day at a fixed wall-clock time in a fixed UTC
//! offset. Triggers never pile up: if the previous sweep is still running
//! at trigger time the trigger is dropped, and fires missed while the
//! process was down are not replayed.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Utc};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ScheduleConfig;
use crate::engine::DomainMonitor;
use crate::error::Result;

/// A fixed time of day in a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    /// Create a schedule firing at `at` local time in `offset`
    pub fn new(at: NaiveTime, offset: FixedOffset) -> Self {
        Self { at, offset }
    }

    /// Build the schedule from configuration
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self::new(config.sweep_time()?, config.offset()?))
    }

    /// Local time of day the schedule fires at
    pub fn time(&self) -> NaiveTime {
        self.at
    }

    /// UTC offset the time is expressed in
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// First fire time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_today = now.with_timezone(&self.offset).date_naive().and_time(self.at);
        let offset = ChronoDuration::seconds(i64::from(self.offset.local_minus_utc()));
        let candidate = (local_today - offset).and_utc();

        if candidate > now {
            candidate
        } else {
            candidate + ChronoDuration::days(1)
        }
    }
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop firing triggers and wait for the scheduler loop to exit
    ///
    /// A sweep that already started keeps running; use
    /// [`DomainMonitor::shutdown`] to stop it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }
}

/// Drives [`DomainMonitor::trigger_scheduled_sweep`] from a [`DailySchedule`]
pub struct Scheduler;

impl Scheduler {
    /// Spawn the scheduler loop
    ///
    /// The loop exits when [`SchedulerHandle::stop`] is called or the
    /// monitor starts shutting down.
    pub fn start(monitor: Arc<DomainMonitor>, schedule: DailySchedule) -> SchedulerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run(monitor, schedule, stop_rx));
        SchedulerHandle { stop_tx, task }
    }
}

async fn run(monitor: Arc<DomainMonitor>, schedule: DailySchedule, mut stop_rx: oneshot::Receiver<()>) {
    let mut shutdown = monitor.shutdown_signal();
    // Last fire time; keeps an early wake-up from firing the same slot twice
    let mut cursor: Option<DateTime<Utc>> = None;

    info!(
        "Scheduler started: daily sweep at {} (UTC{})",
        schedule.time().format("%H:%M"),
        schedule.offset()
    );

    loop {
        let now = Utc::now();
        let from = cursor.map_or(now, |last| last.max(now));
        let next = schedule.next_after(from);
        let wait = (next - now).to_std().unwrap_or_default();

        info!(
            "Next sweep at {}",
            next.with_timezone(&schedule.offset()).format("%Y-%m-%d %H:%M %:z")
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut stop_rx => {
                debug!("Scheduler stop requested");
                break;
            }
            _ = shutdown.wait() => {
                debug!("Monitor shutting down, scheduler exiting");
                break;
            }
        }

        cursor = Some(next);

        if let Some(sweep) = monitor.trigger_scheduled_sweep() {
            tokio::spawn(async move {
                match sweep.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!("Scheduled sweep failed: {}", e),
                    Err(e) => error!("Scheduled sweep task ended abnormally: {}", e),
                }
            });
        }
    }

    info!("Scheduler stopped");
}
