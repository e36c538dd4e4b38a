//! Monitor events
//!
//! Everything the engine does is mirrored on a bounded event channel so that
//! the daemon (or a test) can observe it without reaching into engine state.

use tokio::sync::mpsc;
use tracing::warn;

use super::sweep::{SweepSummary, SweepTrigger};
use crate::traits::{DomainStatus, UserId};

/// Events emitted by the DomainMonitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A sweep took its snapshot and started checking
    SweepStarted {
        trigger: SweepTrigger,
        domains: usize,
    },

    /// First observation of a domain recorded (no notification)
    DomainBaselined {
        domain: String,
        status: DomainStatus,
    },

    /// Status confirmed unchanged
    DomainUnchanged {
        domain: String,
        status: DomainStatus,
    },

    /// Status transition detected
    StatusChanged {
        domain: String,
        old_status: DomainStatus,
        new_status: DomainStatus,
        subscribers: usize,
    },

    /// Domain could not be checked or recorded in this sweep
    DomainFailed {
        domain: String,
        error: String,
        attempts: usize,
    },

    /// A sweep completed (or stopped early on shutdown)
    SweepFinished {
        summary: SweepSummary,
    },

    /// A scheduled trigger fired while a sweep was still running
    TriggerDropped {
        reason: String,
    },

    /// The sink accepted a notification
    NotificationDelivered {
        user_id: UserId,
        domain: String,
    },

    /// A notification was rejected, failed or dropped
    NotificationFailed {
        user_id: UserId,
        domain: String,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Non-blocking handle for emitting monitor events
#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: mpsc::Sender<MonitorEvent>,
}

impl EventEmitter {
    pub(crate) fn new(tx: mpsc::Sender<MonitorEvent>) -> Self {
        Self { tx }
    }

    /// Emit an event, dropping it if the channel is full
    pub(crate) fn emit(&self, event: MonitorEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening any more
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
