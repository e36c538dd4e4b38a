//! Notification dispatch
//!
//! The sweep never talks to the sink directly. It enqueues a
//! [`NotificationTask`] per affected subscriber, waiting only when the
//! queue is full; a worker task owns the sink and delivers with bounded
//! concurrency. Delivery is
//! at-most-once: a failed or rejected delivery is logged and reported as an
//! event, never retried.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::events::{EventEmitter, MonitorEvent};
use crate::traits::{Delivery, DomainStatus, NotificationSink, UserId};

/// One pending status-change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTask {
    pub user_id: UserId,
    pub domain: String,
    pub old_status: DomainStatus,
    pub new_status: DomainStatus,
    pub detected_at: DateTime<Utc>,
}

impl NotificationTask {
    /// Render the user-facing message
    pub fn render(&self) -> String {
        format!(
            "🔔 Domain status changed!\n\n\
             🌐 Domain: {}\n\
             📊 New status: {} {}\n\
             🔄 Change: {}➡️{}\n\
             🕐 Time: {} UTC\n\n\
             💡 Use /subscriptions to manage monitoring",
            self.domain,
            self.new_status.marker(),
            self.new_status,
            self.old_status.marker(),
            self.new_status.marker(),
            self.detected_at.format("%d/%m/%Y %H:%M"),
        )
    }

    /// Render the message, cut to at most `max_len` characters
    pub fn render_limited(&self, max_len: Option<usize>) -> String {
        let text = self.render();
        match max_len {
            Some(limit) => truncate_message(&text, limit),
            None => text,
        }
    }
}

/// Truncate `text` to `max_chars` characters, marking the cut with an ellipsis
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Producer side of the notification queue
#[derive(Debug, Clone)]
pub(crate) struct NotifierHandle {
    tx: mpsc::Sender<NotificationTask>,
    events: EventEmitter,
}

impl NotifierHandle {
    /// Hand a task to the notifier, waiting for queue space
    ///
    /// A full queue applies backpressure to the sweep; the sink is still
    /// only ever called from the worker. Returns `false` if the notifier
    /// has stopped and the task was dropped.
    pub(crate) async fn enqueue(&self, task: NotificationTask) -> bool {
        match self.tx.send(task).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(task)) => {
                warn!(
                    "Notifier stopped, dropping notification for user {} ({})",
                    task.user_id, task.domain
                );
                self.report_dropped(task, "notifier stopped");
                false
            }
        }
    }

    fn report_dropped(&self, task: NotificationTask, reason: &str) {
        self.events.emit(MonitorEvent::NotificationFailed {
            user_id: task.user_id,
            domain: task.domain,
            error: reason.to_string(),
        });
    }
}

/// Running notifier worker
#[derive(Debug)]
pub(crate) struct NotifierWorker {
    drain_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl NotifierWorker {
    /// Stop accepting new work, deliver what is queued, and wait for the
    /// worker to exit
    pub(crate) async fn drain(self) {
        let _ = self.drain_tx.send(());
        if let Err(e) = self.handle.await {
            error!("Notifier worker ended abnormally: {}", e);
        }
    }
}

/// Spawn the notifier worker
///
/// # Parameters
///
/// - `sink`: Delivery backend
/// - `events`: Event channel for delivery outcomes
/// - `queue_capacity`: Bound of the task queue
/// - `max_concurrent`: Deliveries in flight at once
/// - `grace`: Time allowed for in-flight deliveries once draining starts
pub(crate) fn spawn(
    sink: Arc<dyn NotificationSink>,
    events: EventEmitter,
    queue_capacity: usize,
    max_concurrent: usize,
    grace: Duration,
) -> (NotifierHandle, NotifierWorker) {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let (drain_tx, drain_rx) = oneshot::channel();

    let worker_events = events.clone();
    let handle = tokio::spawn(async move {
        run_worker(sink, worker_events, rx, drain_rx, max_concurrent, grace).await;
    });

    (
        NotifierHandle { tx, events },
        NotifierWorker { drain_tx, handle },
    )
}

async fn run_worker(
    sink: Arc<dyn NotificationSink>,
    events: EventEmitter,
    rx: mpsc::Receiver<NotificationTask>,
    mut drain_rx: oneshot::Receiver<()>,
    max_concurrent: usize,
    grace: Duration,
) {
    let mut tasks = ReceiverStream::new(rx);
    let mut in_flight = JoinSet::new();

    info!("Notifier started (sink: {})", sink.sink_name());

    loop {
        tokio::select! {
            next = tasks.next() => match next {
                Some(task) => {
                    while in_flight.len() >= max_concurrent {
                        reap(in_flight.join_next().await);
                    }
                    in_flight.spawn(deliver(sink.clone(), task, events.clone()));
                }
                None => break,
            },
            _ = &mut drain_rx => {
                debug!("Notifier draining");
                break;
            }
        }
    }

    // Deliver whatever was already queued, then stop
    tasks.close();
    let deadline = tokio::time::Instant::now() + grace;
    while let Some(task) = tasks.next().await {
        while in_flight.len() >= max_concurrent {
            reap(in_flight.join_next().await);
        }
        in_flight.spawn(deliver(sink.clone(), task, events.clone()));
    }

    let drained = tokio::time::timeout_at(deadline, async {
        while let Some(joined) = in_flight.join_next().await {
            reap(Some(joined));
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            "Shutdown grace of {:?} elapsed with {} deliveries in flight, abandoning them",
            grace,
            in_flight.len()
        );
        in_flight.abort_all();
    }

    info!("Notifier stopped");
}

fn reap(joined: Option<Result<(), tokio::task::JoinError>>) {
    if let Some(Err(e)) = joined {
        error!("Delivery task panicked: {}", e);
    }
}

async fn deliver(sink: Arc<dyn NotificationSink>, task: NotificationTask, events: EventEmitter) {
    let text = task.render_limited(sink.max_message_len());

    match sink.deliver(task.user_id, &text).await {
        Ok(Delivery::Accepted) => {
            info!("Notification sent to user {} for domain {}", task.user_id, task.domain);
            events.emit(MonitorEvent::NotificationDelivered {
                user_id: task.user_id,
                domain: task.domain,
            });
        }
        Ok(Delivery::Rejected { reason }) => {
            warn!(
                "Sink {} rejected notification for user {} ({}): {}",
                sink.sink_name(),
                task.user_id,
                task.domain,
                reason
            );
            events.emit(MonitorEvent::NotificationFailed {
                user_id: task.user_id,
                domain: task.domain,
                error: reason,
            });
        }
        Err(e) => {
            error!(
                "Failed to send notification to user {} for domain {}: {}",
                task.user_id, task.domain, e
            );
            events.emit(MonitorEvent::NotificationFailed {
                user_id: task.user_id,
                domain: task.domain,
                error: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task() -> NotificationTask {
        NotificationTask {
            user_id: UserId(7),
            domain: "example.com".to_string(),
            old_status: DomainStatus::NotBlocked,
            new_status: DomainStatus::Blocked,
            detected_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_contains_transition() {
        let text = task().render();
        assert!(text.contains("🌐 Domain: example.com"));
        assert!(text.contains("📊 New status: 🔴 Blocked"));
        assert!(text.contains("🔄 Change: 🟢➡️🔴"));
        assert!(text.contains("🕐 Time: 01/03/2024 09:00 UTC"));
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_message("abcdefghijk", 5), "abcd…");
        assert_eq!(truncate_message("abc", 0), "");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "🔴🔴🔴🔴";
        assert_eq!(truncate_message(text, 4), text);
        assert_eq!(truncate_message(text, 3), "🔴🔴…");
    }

    #[test]
    fn test_render_limited() {
        let t = task();
        assert_eq!(t.render_limited(None), t.render());
        assert_eq!(t.render_limited(Some(20)).chars().count(), 20);
    }
}
