//! Global classifier call spacing
//!
//! The external classifier has no published quota, so the engine keeps a
//! single shared budget: at most one outstanding request, and consecutive
//! requests start at least `min_spacing` apart. Sweeps and ad-hoc checks
//! draw from the same spacer.

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::trace;

/// Serializes classifier calls and enforces a minimum start-to-start gap
#[derive(Debug)]
pub struct CallSpacer {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

/// Permission to issue one classifier call
///
/// Holding the permit keeps every other caller waiting; drop it once the
/// call has completed.
#[derive(Debug)]
pub struct CallPermit<'a> {
    _slot: MutexGuard<'a, Option<Instant>>,
}

impl CallSpacer {
    /// Create a spacer with the given minimum gap between call starts
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    /// The configured minimum gap
    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Wait until a call may be issued
    ///
    /// Cancellation-safe: dropping the future while it waits releases the
    /// slot without recording a call.
    pub async fn acquire(&self) -> CallPermit<'_> {
        let mut slot = self.last_call.lock().await;

        if let Some(last) = *slot {
            let ready_at = last + self.min_spacing;
            if ready_at > Instant::now() {
                trace!("Waiting {:?} for classifier call spacing", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *slot = Some(Instant::now());
        CallPermit { _slot: slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let spacer = CallSpacer::new(Duration::from_secs(1));
        let start = Instant::now();
        drop(spacer.acquire().await);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let spacer = CallSpacer::new(Duration::from_secs(1));

        let first = Instant::now();
        drop(spacer.acquire().await);
        drop(spacer.acquire().await);
        let second = Instant::now();
        drop(spacer.acquire().await);
        let third = Instant::now();

        assert!(second - first >= Duration::from_secs(1));
        assert!(third - second >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_gap_already_elapsed() {
        let spacer = CallSpacer::new(Duration::from_secs(1));
        drop(spacer.acquire().await);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        drop(spacer.acquire().await);
        assert_eq!(Instant::now(), before);
    }
}
