//! Sweep runner
//!
//! One sweep checks every distinct subscribed domain exactly once:
//!
//! 1. Snapshot all active subscriptions and group them by domain
//! 2. For each domain (in lexicographic order), classify with at most
//!    `max_retries` retries, all calls going through the shared spacer
//! 3. Compare against the status cache:
//!    - no record: store the baseline, notify nobody
//!    - same status: refresh the timestamp
//!    - different status: store it, enqueue one notification per subscriber
//! 4. Prune cache records no subscription references, flush the store
//!
//! A failure on one domain never affects another. A domain whose classifier
//! calls all fail keeps its previous cache record untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use super::DomainMonitor;
use super::events::MonitorEvent;
use super::notifier::NotificationTask;
use super::shutdown::ShutdownSignal;
use crate::error::{Error, Result};
use crate::traits::{
    CheckHistoryEntry, CheckSource, Classification, DomainStatus, Subscription, UserId,
};

/// What started a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTrigger {
    /// The daily schedule fired
    Scheduled,
    /// An operator asked for it
    Manual,
}

impl fmt::Display for SweepTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Outcome counts of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub trigger: SweepTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Distinct domains in the snapshot
    pub domains: usize,
    /// Domains classified and recorded
    pub checked: usize,
    /// Domains whose status changed
    pub changed: usize,
    /// Domains that could not be classified or recorded
    pub failed: usize,
    /// Subset of `failed` caused by the store
    pub store_failures: usize,
    /// Notification tasks enqueued
    pub notifications: usize,
    /// The sweep stopped early because of shutdown
    pub cancelled: bool,
}

impl SweepSummary {
    fn new(trigger: SweepTrigger, started_at: DateTime<Utc>, domains: usize) -> Self {
        Self {
            trigger,
            started_at,
            finished_at: started_at,
            domains,
            checked: 0,
            changed: 0,
            failed: 0,
            store_failures: 0,
            notifications: 0,
            cancelled: false,
        }
    }

    /// Every domain failed on the store: the sweep as a whole failed
    pub fn is_total_failure(&self) -> bool {
        self.domains > 0 && self.store_failures == self.domains
    }
}

/// Exclusive right to run a sweep
#[derive(Debug)]
pub(crate) struct SweepGuard {
    _lock: OwnedMutexGuard<()>,
}

impl SweepGuard {
    pub(crate) fn new(lock: OwnedMutexGuard<()>) -> Self {
        Self { _lock: lock }
    }
}

enum ClassifyOutcome {
    Classified(Classification),
    Failed { error: Error, attempts: usize },
    Cancelled,
}

enum Observation {
    Baseline,
    Unchanged,
    Changed { notified: usize },
}

/// Group a subscription snapshot by domain, in lexicographic order
pub(crate) fn group_by_domain(snapshot: Vec<Subscription>) -> BTreeMap<String, Vec<UserId>> {
    let mut targets: BTreeMap<String, Vec<UserId>> = BTreeMap::new();
    for subscription in snapshot {
        targets
            .entry(subscription.domain)
            .or_default()
            .push(subscription.user_id);
    }
    targets
}

impl DomainMonitor {
    /// Run one sweep while holding the sweep guard
    pub(crate) async fn sweep(&self, _guard: SweepGuard, trigger: SweepTrigger) -> Result<SweepSummary> {
        let started_at = Utc::now();
        let targets = group_by_domain(self.store.list_all_active().await?);

        info!("Starting {} sweep of {} domains", trigger, targets.len());
        self.events.emit(MonitorEvent::SweepStarted {
            trigger,
            domains: targets.len(),
        });

        let mut summary = SweepSummary::new(trigger, started_at, targets.len());
        let mut shutdown = self.shutdown_signal();

        for (domain, subscribers) in &targets {
            let (error, attempts, store_failure) = match self.classify_with_retry(domain, &mut shutdown).await {
                ClassifyOutcome::Cancelled => {
                    info!("Shutdown requested, stopping sweep before {}", domain);
                    summary.cancelled = true;
                    break;
                }
                ClassifyOutcome::Failed { error, attempts } => (error, attempts, false),
                ClassifyOutcome::Classified(classification) => {
                    match self.observe(domain, subscribers, classification.status).await {
                        Ok(observation) => {
                            summary.checked += 1;
                            if let Observation::Changed { notified } = observation {
                                summary.changed += 1;
                                summary.notifications += notified;
                            }
                            continue;
                        }
                        Err(e) => (e, 1, true),
                    }
                }
            };

            if store_failure {
                error!("Store error while recording {}: {}", domain, error);
                summary.store_failures += 1;
            } else {
                warn!("Giving up on {} after {} attempt(s): {}", domain, attempts, error);
            }
            summary.failed += 1;
            self.events.emit(MonitorEvent::DomainFailed {
                domain: domain.clone(),
                error: error.to_string(),
                attempts,
            });
        }

        self.prune_orphaned_statuses().await;

        if let Err(e) = self.store.flush().await {
            error!("Failed to flush store after sweep: {}", e);
        }

        summary.finished_at = Utc::now();

        if summary.is_total_failure() {
            error!(
                "Sweep failed: store errors on all {} domains",
                summary.domains
            );
        } else {
            info!(
                "Sweep completed: {} domains, {} checked, {} changed, {} failed, {} notifications{}",
                summary.domains,
                summary.checked,
                summary.changed,
                summary.failed,
                summary.notifications,
                if summary.cancelled { " (cancelled)" } else { "" }
            );
        }

        self.events.emit(MonitorEvent::SweepFinished {
            summary: summary.clone(),
        });

        Ok(summary)
    }

    async fn classify_with_retry(&self, domain: &str, shutdown: &mut ShutdownSignal) -> ClassifyOutcome {
        let max_attempts = 1 + self.config.max_retries;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match self.client.check_status_unless_shutdown(domain, shutdown).await {
                None => return ClassifyOutcome::Cancelled,
                Some(Ok(classification)) => return ClassifyOutcome::Classified(classification),
                Some(Err(e)) => e,
            };

            if attempts >= max_attempts || !error.is_retryable() {
                return ClassifyOutcome::Failed { error, attempts };
            }

            debug!("Attempt {} failed for {}: {}, retrying", attempts, domain, error);
        }
    }

    /// Diff a fresh status against the cache and act on it
    async fn observe(
        &self,
        domain: &str,
        subscribers: &[UserId],
        status: DomainStatus,
    ) -> Result<Observation> {
        let now = Utc::now();
        let previous = self.store.get(domain).await?;
        self.store.set(domain, status, now).await?;

        match previous {
            None => {
                debug!("Baseline for {}: {}", domain, status);
                self.record_history(domain, subscribers, status, now).await;
                self.events.emit(MonitorEvent::DomainBaselined {
                    domain: domain.to_string(),
                    status,
                });
                Ok(Observation::Baseline)
            }
            Some(record) if record.last_status == status => {
                debug!("{} unchanged: {}", domain, status);
                self.events.emit(MonitorEvent::DomainUnchanged {
                    domain: domain.to_string(),
                    status,
                });
                Ok(Observation::Unchanged)
            }
            Some(record) => {
                info!("{} changed: {} -> {}", domain, record.last_status, status);

                let mut notified = 0;
                for &user_id in subscribers {
                    let task = NotificationTask {
                        user_id,
                        domain: domain.to_string(),
                        old_status: record.last_status,
                        new_status: status,
                        detected_at: now,
                    };
                    if self.notifier.enqueue(task).await {
                        notified += 1;
                    }
                }

                self.record_history(domain, subscribers, status, now).await;
                self.events.emit(MonitorEvent::StatusChanged {
                    domain: domain.to_string(),
                    old_status: record.last_status,
                    new_status: status,
                    subscribers: subscribers.len(),
                });
                Ok(Observation::Changed { notified })
            }
        }
    }

    /// History is an audit trail: failures are logged, not propagated
    async fn record_history(
        &self,
        domain: &str,
        subscribers: &[UserId],
        status: DomainStatus,
        checked_at: DateTime<Utc>,
    ) {
        for &user_id in subscribers {
            let entry = CheckHistoryEntry {
                user_id,
                domain: domain.to_string(),
                status,
                checked_at,
                source: CheckSource::Sweep,
            };
            if let Err(e) = self.store.append(&entry).await {
                warn!("Failed to record history for user {} ({}): {}", user_id, domain, e);
            }
        }
    }

    /// Delete status records that no subscription references
    async fn prune_orphaned_statuses(&self) {
        let domains = match self.store.list_domains().await {
            Ok(domains) => domains,
            Err(e) => {
                warn!("Could not list cached domains for pruning: {}", e);
                return;
            }
        };

        for domain in domains {
            match self.store.is_referenced(&domain).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Pruning orphaned status record for {}", domain);
                    if let Err(e) = self.store.delete(&domain).await {
                        warn!("Failed to prune status record for {}: {}", domain, e);
                    }
                }
                Err(e) => warn!("Failed to check references for {}: {}", domain, e),
            }
        }
    }
}
