//! Core monitoring engine
//!
//! The DomainMonitor is responsible for:
//! - Managing per-user subscriptions (through the Store)
//! - Running sweeps that detect status transitions
//! - Handing notifications to the notifier worker
//! - Serving ad-hoc checks and history lookups
//!
//! ## Architecture
//!
//! ```text
//!  Scheduler ── trigger ──┐            ┌── check_now / subscribe / history
//!                         ▼            ▼
//!                    ┌──────────────────────┐
//!                    │    DomainMonitor     │
//!                    └──────────────────────┘
//!                         │        │       │
//!         ┌───────────────┘        │       └──────────────┐
//!         ▼                        ▼                      ▼
//! ┌──────────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ ClassifierClient │     │    Store     │     │     Notifier      │
//! │ (spacing, timeout│     │ (subs, cache,│     │ (queue, bounded   │
//! │  latency)        │     │  history)    │     │  concurrent sink) │
//! └──────────────────┘     └──────────────┘     └───────────────────┘
//! ```
//!
//! ## Sweep Flow
//!
//! 1. Snapshot subscriptions, group by domain
//! 2. Classify each domain once (spaced, timeout-bounded, one retry)
//! 3. Diff against the status cache
//! 4. Enqueue notifications for transitions, record history
//! 5. Prune orphaned cache records, flush, emit a summary

mod client;
mod events;
mod notifier;
mod shutdown;
mod spacing;
mod sweep;

pub use client::ClassifierClient;
pub use events::MonitorEvent;
pub use notifier::{NotificationTask, truncate_message};
pub use shutdown::ShutdownSignal;
pub use spacing::{CallPermit, CallSpacer};
pub use sweep::{SweepSummary, SweepTrigger};

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{EngineConfig, MonitorConfig};
use crate::domain::normalize_domain;
use crate::error::{Error, Result};
use crate::traits::{
    CheckHistoryEntry, CheckSource, Classification, Classifier, NotificationSink, Store,
    Subscription, UserId,
};
use events::EventEmitter;
use notifier::{NotifierHandle, NotifierWorker};
use sweep::SweepGuard;

/// Core domain monitoring engine
///
/// ## Lifecycle
///
/// 1. Create with [`DomainMonitor::new()`] (inside a Tokio runtime)
/// 2. Serve user operations; start a [`Scheduler`](crate::scheduler::Scheduler)
///    for daily sweeps
/// 3. Call [`DomainMonitor::shutdown()`] to stop sweeps, drain notifications
///    and flush the store
///
/// ## Concurrency
///
/// All operations take `&self` and may run concurrently. At most one sweep
/// runs at a time; classifier calls are serialized and spaced globally.
///
/// ## Load Resistance
///
/// - **Bounded event channel**: Events are dropped (logged) when full
/// - **Bounded notification queue**: A full queue makes the sweep wait
/// - **Bounded deliveries**: At most `max_concurrent_deliveries` in flight
pub struct DomainMonitor {
    /// Spaced, timeout-bounded classifier access
    client: ClassifierClient,

    /// Subscriptions, status cache and history
    store: Arc<dyn Store>,

    /// Producer side of the notification queue
    notifier: NotifierHandle,

    /// Notifier worker, taken on shutdown
    notifier_worker: Mutex<Option<NotifierWorker>>,

    /// Event sender for external monitoring
    events: EventEmitter,

    /// Engine settings
    config: EngineConfig,

    /// Held for the duration of a sweep
    sweep_lock: Arc<Mutex<()>>,

    /// Set once shutdown starts
    shutdown_tx: watch::Sender<bool>,
}

impl DomainMonitor {
    /// Create a new monitor
    ///
    /// Spawns the notifier worker, so this must run inside a Tokio runtime.
    ///
    /// # Parameters
    ///
    /// - `classifier`: Classifier implementation
    /// - `sink`: Notification sink implementation
    /// - `store`: Store implementation
    /// - `config`: Monitor configuration
    ///
    /// # Returns
    ///
    /// A tuple of (monitor, event_receiver) where event_receiver yields monitor events
    pub fn new(
        classifier: Box<dyn Classifier>,
        sink: Box<dyn NotificationSink>,
        store: Arc<dyn Store>,
        config: MonitorConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<MonitorEvent>)> {
        config.validate()?;
        let engine = config.engine;

        let (event_tx, event_rx) = mpsc::channel(engine.event_channel_capacity);
        let events = EventEmitter::new(event_tx);

        let (notifier, worker) = notifier::spawn(
            Arc::from(sink),
            events.clone(),
            engine.notification_queue_capacity,
            engine.max_concurrent_deliveries,
            engine.shutdown_grace(),
        );

        let client = ClassifierClient::new(
            classifier,
            engine.classifier_timeout(),
            engine.min_call_spacing(),
        );

        let (shutdown_tx, _) = watch::channel(false);

        let monitor = Self {
            client,
            store,
            notifier,
            notifier_worker: Mutex::new(Some(worker)),
            events,
            config: engine,
            sweep_lock: Arc::new(Mutex::new(())),
            shutdown_tx,
        };

        Ok((Arc::new(monitor), event_rx))
    }

    /// Subscribe a user to a domain
    ///
    /// The domain is normalized first (`HTTPS://Example.COM/` and
    /// `example.com` are the same subscription).
    ///
    /// # Returns
    ///
    /// - `Ok(Subscription)`: Created
    /// - `Err(Error::AlreadyExists)`: Already subscribed
    /// - `Err(Error::CapacityExceeded)`: The user is at the limit
    /// - `Err(Error::InvalidInput)`: Not a domain name
    pub async fn subscribe(&self, user_id: UserId, domain: &str) -> Result<Subscription> {
        let domain = normalize_domain(domain)?;
        let subscription = self.store.add(user_id, &domain).await?;
        info!("User {} subscribed to {}", user_id, domain);
        Ok(subscription)
    }

    /// Unsubscribe a user from a domain
    ///
    /// Idempotent. When the last subscriber leaves, the domain's status
    /// record is deleted so a later re-subscription starts from a fresh
    /// baseline.
    ///
    /// # Returns
    ///
    /// Whether a subscription was removed
    pub async fn unsubscribe(&self, user_id: UserId, domain: &str) -> Result<bool> {
        let domain = normalize_domain(domain)?;
        let removed = self.store.remove(user_id, &domain).await?;

        if removed {
            info!("User {} unsubscribed from {}", user_id, domain);
            match self.store.is_referenced(&domain).await {
                Ok(false) => {
                    if let Err(e) = self.store.delete(&domain).await {
                        warn!("Failed to delete status record for {}: {}", domain, e);
                    }
                }
                Ok(true) => {}
                Err(e) => warn!("Failed to check references for {}: {}", domain, e),
            }
        }

        Ok(removed)
    }

    /// A user's subscriptions
    pub async fn subscriptions(&self, user_id: UserId) -> Result<Vec<Subscription>> {
        self.store.list_by_user(user_id).await
    }

    /// Check one domain right now on behalf of a user
    ///
    /// Shares the classifier spacing with sweeps and records an ad-hoc
    /// history entry. The status cache is never touched, so an ad-hoc check
    /// cannot trigger or swallow a change notification.
    pub async fn check_now(&self, user_id: UserId, domain: &str) -> Result<Classification> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let domain = normalize_domain(domain)?;
        let classification = self.client.check_status(&domain).await?;

        let entry = CheckHistoryEntry {
            user_id,
            domain: domain.clone(),
            status: classification.status,
            checked_at: Utc::now(),
            source: CheckSource::AdHoc,
        };
        if let Err(e) = self.store.append(&entry).await {
            warn!("Failed to record history for user {} ({}): {}", user_id, domain, e);
        }

        Ok(classification)
    }

    /// A user's most recent checks, newest first
    ///
    /// `limit` defaults to the configured `history_display_limit`.
    pub async fn recent_history(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<CheckHistoryEntry>> {
        let limit = limit.unwrap_or(self.config.history_display_limit);
        self.store.list_recent(user_id, limit).await
    }

    /// Run a sweep now and wait for it
    ///
    /// # Returns
    ///
    /// - `Ok(SweepSummary)`: The sweep ran (possibly cancelled by shutdown)
    /// - `Err(Error::SweepInProgress)`: Another sweep is running
    /// - `Err(Error::ShuttingDown)`: Shutdown has started
    /// - `Err(Error::Store)`: The subscription snapshot could not be read
    pub async fn run_sweep_now(&self) -> Result<SweepSummary> {
        let guard = self.begin_sweep()?;
        self.sweep(guard, SweepTrigger::Manual).await
    }

    /// Start a scheduled sweep in the background
    ///
    /// If a sweep is already running the trigger is dropped (not queued)
    /// and `None` is returned.
    pub fn trigger_scheduled_sweep(self: &Arc<Self>) -> Option<JoinHandle<Result<SweepSummary>>> {
        let guard = match self.begin_sweep() {
            Ok(guard) => guard,
            Err(Error::SweepInProgress) => {
                warn!("Previous sweep still running, dropping scheduled trigger");
                self.events.emit(MonitorEvent::TriggerDropped {
                    reason: "sweep already in progress".to_string(),
                });
                return None;
            }
            Err(e) => {
                info!("Skipping scheduled sweep: {}", e);
                return None;
            }
        };

        let monitor = Arc::clone(self);
        Some(tokio::spawn(async move {
            monitor.sweep(guard, SweepTrigger::Scheduled).await
        }))
    }

    /// Whether a sweep is running right now
    pub fn is_sweeping(&self) -> bool {
        self.sweep_lock.try_lock().is_err()
    }

    /// Whether shutdown has started
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Subscribe to the shutdown flag
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.shutdown_tx.subscribe())
    }

    /// Shut the engine down
    ///
    /// 1. Stop issuing classifier calls (a running sweep stops early)
    /// 2. Wait for the running sweep to finish its current domain
    /// 3. Deliver queued notifications within `shutdown_grace_secs`
    /// 4. Flush the store
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let first = !self.shutdown_tx.send_replace(true);
        if first {
            info!("Shutdown requested");
        }

        // Waits for an in-flight sweep to observe the flag
        let _sweep = self.sweep_lock.lock().await;

        if let Some(worker) = self.notifier_worker.lock().await.take() {
            worker.drain().await;
        }

        self.store.flush().await?;

        if first {
            info!("Store flushed, monitor stopped");
            self.events.emit(MonitorEvent::Stopped {
                reason: "Shutdown requested".to_string(),
            });
        }

        Ok(())
    }

    fn begin_sweep(&self) -> Result<SweepGuard> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }
        self.sweep_lock
            .clone()
            .try_lock_owned()
            .map(SweepGuard::new)
            .map_err(|_| Error::SweepInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use crate::traits::{Delivery, DomainStatus};
    use async_trait::async_trait;

    struct FixedClassifier(DomainStatus);

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _domain: &str) -> Result<DomainStatus> {
            Ok(self.0)
        }

        fn classifier_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct NullSink;

    #[async_trait]
    impl NotificationSink for NullSink {
        async fn deliver(&self, _user_id: UserId, _text: &str) -> Result<Delivery> {
            Ok(Delivery::Accepted)
        }

        fn sink_name(&self) -> &'static str {
            "null"
        }
    }

    fn monitor() -> (Arc<DomainMonitor>, mpsc::Receiver<MonitorEvent>) {
        let mut config = MonitorConfig::default();
        config.engine.min_call_spacing_ms = 0;
        DomainMonitor::new(
            Box::new(FixedClassifier(DomainStatus::NotBlocked)),
            Box::new(NullSink),
            Arc::new(MemoryStore::new()),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_normalizes_domain() {
        let (monitor, _events) = monitor();

        let sub = monitor
            .subscribe(UserId(1), "HTTPS://Example.COM/path")
            .await
            .unwrap();
        assert_eq!(sub.domain, "example.com");

        let err = monitor.subscribe(UserId(1), "example.com").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_check_now_records_ad_hoc_history() {
        let (monitor, _events) = monitor();

        let result = monitor.check_now(UserId(1), "example.com").await.unwrap();
        assert_eq!(result.status, DomainStatus::NotBlocked);

        let history = monitor.recent_history(UserId(1), None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, CheckSource::AdHoc);
    }

    #[tokio::test]
    async fn test_operations_after_shutdown() {
        let (monitor, mut events) = monitor();

        monitor.shutdown().await.unwrap();
        monitor.shutdown().await.unwrap();

        assert!(matches!(monitor.run_sweep_now().await, Err(Error::ShuttingDown)));
        assert!(matches!(
            monitor.check_now(UserId(1), "example.com").await,
            Err(Error::ShuttingDown)
        ));

        let mut stopped = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, MonitorEvent::Stopped { .. }) {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 1);
    }
}
