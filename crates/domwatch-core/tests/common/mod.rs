//! Test doubles and common utilities for contract tests
//!
//! These doubles script classifier answers, record deliveries and inject
//! store failures so the engine's behavior can be observed from outside.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domwatch_core::config::{EngineConfig, MonitorConfig};
use domwatch_core::error::{Error, Result};
use domwatch_core::state::MemoryStore;
use domwatch_core::traits::{
    CheckHistoryEntry, Classifier, Delivery, DomainStatus, HistoryStore, NotificationSink,
    StatusCache, StatusRecord, Store, Subscription, SubscriptionStore, UserId,
};
use domwatch_core::{DomainMonitor, MonitorEvent};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One scripted classifier answer
#[derive(Debug, Clone)]
pub enum Answer {
    /// Answer with a status
    Status(DomainStatus),
    /// Fail with a classifier error
    Fail(&'static str),
    /// Answer after a delay
    Slow(Duration, DomainStatus),
}

impl Answer {
    pub fn blocked() -> Self {
        Self::Status(DomainStatus::Blocked)
    }

    pub fn not_blocked() -> Self {
        Self::Status(DomainStatus::NotBlocked)
    }
}

/// A Classifier that answers from per-domain scripts
///
/// Domains without a script (or with an exhausted one) get the default
/// answer. Every call is recorded with its start time.
pub struct ScriptedClassifier {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Answer>>>>,
    default: Arc<Mutex<Answer>>,
    calls: Arc<Mutex<Vec<(String, Instant)>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            default: Arc::new(Mutex::new(Answer::not_blocked())),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a classifier that shares scripts and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            scripts: Arc::clone(&other.scripts),
            default: Arc::clone(&other.default),
            calls: Arc::clone(&other.calls),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
        }
    }

    /// Queue answers for a domain
    pub fn script(&self, domain: &str, answers: impl IntoIterator<Item = Answer>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default()
            .extend(answers);
    }

    /// Answer used when a domain has no script left
    pub fn set_default(&self, answer: Answer) {
        *self.default.lock().unwrap() = answer;
    }

    /// Total number of classify() calls
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of classify() calls for one domain
    pub fn calls_for(&self, domain: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == domain)
            .count()
    }

    /// Domains in call order
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(d, _)| d.clone()).collect()
    }

    /// Call start times in call order
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Highest number of concurrent classify() calls seen
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_answer(&self, domain: &str) -> Answer {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(domain)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| self.default.lock().unwrap().clone())
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, domain: &str) -> Result<DomainStatus> {
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), Instant::now()));
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let answer = self.next_answer(domain);
        let result = match answer {
            Answer::Status(status) => Ok(status),
            Answer::Fail(msg) => Err(Error::classifier(msg)),
            Answer::Slow(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn classifier_name(&self) -> &'static str {
        "scripted"
    }
}

/// A NotificationSink that records deliveries
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<(UserId, String)>>>,
    attempts: Arc<AtomicUsize>,
    failing_users: Arc<Mutex<HashSet<UserId>>>,
    rejecting_users: Arc<Mutex<HashSet<UserId>>>,
    max_len: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            delivered: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            failing_users: Arc::new(Mutex::new(HashSet::new())),
            rejecting_users: Arc::new(Mutex::new(HashSet::new())),
            max_len: None,
        }
    }

    /// Report a transport-level maximum message length
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Create a sink that shares recordings with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            delivered: Arc::clone(&other.delivered),
            attempts: Arc::clone(&other.attempts),
            failing_users: Arc::clone(&other.failing_users),
            rejecting_users: Arc::clone(&other.rejecting_users),
            max_len: other.max_len,
        }
    }

    /// Make deliveries to `user_id` fail with a transport error
    pub fn fail_for(&self, user_id: UserId) {
        self.failing_users.lock().unwrap().insert(user_id);
    }

    /// Make the transport reject deliveries to `user_id`
    pub fn reject_for(&self, user_id: UserId) {
        self.rejecting_users.lock().unwrap().insert(user_id);
    }

    /// Accepted deliveries, in completion order
    pub fn delivered(&self) -> Vec<(UserId, String)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Users that received an accepted delivery, sorted
    pub fn delivered_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.delivered().into_iter().map(|(u, _)| u).collect();
        users.sort();
        users
    }

    /// Total deliver() calls, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` deliver() calls happened, or the timeout elapses
    pub async fn wait_for_attempts(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.attempts() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.attempts() >= n
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, user_id: UserId, text: &str) -> Result<Delivery> {
        let result = if self.failing_users.lock().unwrap().contains(&user_id) {
            Err(Error::delivery("transport unavailable"))
        } else if self.rejecting_users.lock().unwrap().contains(&user_id) {
            Ok(Delivery::Rejected {
                reason: "Forbidden: bot was blocked by the user".to_string(),
            })
        } else {
            self.delivered
                .lock()
                .unwrap()
                .push((user_id, text.to_string()));
            Ok(Delivery::Accepted)
        };

        self.attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn max_message_len(&self) -> Option<usize> {
        self.max_len
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A Store wrapper that can be told to fail status cache operations
pub struct FlakyStore {
    inner: MemoryStore,
    fail_status_reads: AtomicBool,
    fail_status_writes: AtomicBool,
    flush_count: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_status_reads: AtomicBool::new(false),
            fail_status_writes: AtomicBool::new(false),
            flush_count: AtomicUsize::new(0),
        }
    }

    pub fn fail_status_reads(&self, fail: bool) {
        self.fail_status_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_writes(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::SeqCst);
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionStore for FlakyStore {
    async fn add(&self, user_id: UserId, domain: &str) -> Result<Subscription> {
        self.inner.add(user_id, domain).await
    }

    async fn remove(&self, user_id: UserId, domain: &str) -> Result<bool> {
        self.inner.remove(user_id, domain).await
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>> {
        self.inner.list_by_user(user_id).await
    }

    async fn list_all_active(&self) -> Result<Vec<Subscription>> {
        self.inner.list_all_active().await
    }

    async fn is_referenced(&self, domain: &str) -> Result<bool> {
        self.inner.is_referenced(domain).await
    }
}

#[async_trait]
impl StatusCache for FlakyStore {
    async fn get(&self, domain: &str) -> Result<Option<StatusRecord>> {
        if self.fail_status_reads.load(Ordering::SeqCst) {
            return Err(Error::store("status cache unavailable"));
        }
        self.inner.get(domain).await
    }

    async fn set(&self, domain: &str, status: DomainStatus, checked_at: DateTime<Utc>) -> Result<()> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(Error::store("status cache unavailable"));
        }
        self.inner.set(domain, status, checked_at).await
    }

    async fn delete(&self, domain: &str) -> Result<()> {
        self.inner.delete(domain).await
    }

    async fn list_domains(&self) -> Result<Vec<String>> {
        self.inner.list_domains().await
    }
}

#[async_trait]
impl HistoryStore for FlakyStore {
    async fn append(&self, entry: &CheckHistoryEntry) -> Result<()> {
        self.inner.append(entry).await
    }

    async fn list_recent(&self, user_id: UserId, limit: usize) -> Result<Vec<CheckHistoryEntry>> {
        self.inner.list_recent(user_id, limit).await
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Helper to create a minimal MonitorConfig for testing
///
/// Call spacing is disabled; tests that exercise spacing set it explicitly.
pub fn minimal_config() -> MonitorConfig {
    MonitorConfig {
        engine: EngineConfig {
            min_call_spacing_ms: 0,
            max_retries: 1,
            event_channel_capacity: 1000,
            shutdown_grace_secs: 5,
            ..EngineConfig::default()
        },
        ..MonitorConfig::default()
    }
}

/// Everything a contract test needs to drive and observe a monitor
pub struct Harness {
    pub monitor: Arc<DomainMonitor>,
    pub events: mpsc::Receiver<MonitorEvent>,
    pub classifier: ScriptedClassifier,
    pub sink: RecordingSink,
}

impl Harness {
    /// Build a monitor over a memory store
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Build a monitor over the given store
    pub fn with_store(config: MonitorConfig, store: Arc<dyn Store>) -> Self {
        Self::with_parts(config, store, RecordingSink::new())
    }

    /// Build a monitor over the given store and sink
    pub fn with_parts(config: MonitorConfig, store: Arc<dyn Store>, sink: RecordingSink) -> Self {
        let classifier = ScriptedClassifier::new();
        let (monitor, events) = DomainMonitor::new(
            Box::new(ScriptedClassifier::sharing_counters_with(&classifier)),
            Box::new(RecordingSink::sharing_counters_with(&sink)),
            store,
            config,
        )
        .unwrap();

        Self {
            monitor,
            events,
            classifier,
            sink,
        }
    }

    /// Drain all events emitted so far
    pub fn drain_events(&mut self) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
