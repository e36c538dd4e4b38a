//! Classifier client
//!
//! Wraps a [`Classifier`] with the engine-owned call policy: global call
//! spacing, a hard per-call timeout, and latency measurement. It never
//! retries; retrying is the sweep runner's decision.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::shutdown::ShutdownSignal;
use super::spacing::{CallPermit, CallSpacer};
use crate::error::{Error, Result};
use crate::traits::{Classification, Classifier};

/// Timeout-bounded, spacing-aware access to the classifier
pub struct ClassifierClient {
    classifier: Box<dyn Classifier>,
    timeout: Duration,
    spacer: CallSpacer,
}

impl ClassifierClient {
    /// Create a client
    ///
    /// # Parameters
    ///
    /// - `classifier`: Backend implementation
    /// - `timeout`: Upper bound for a single call
    /// - `min_spacing`: Minimum gap between consecutive call starts
    pub fn new(classifier: Box<dyn Classifier>, timeout: Duration, min_spacing: Duration) -> Self {
        Self {
            classifier,
            timeout,
            spacer: CallSpacer::new(min_spacing),
        }
    }

    /// Name of the wrapped classifier
    pub fn classifier_name(&self) -> &'static str {
        self.classifier.classifier_name()
    }

    /// Check a domain, waiting for the call spacing first
    ///
    /// # Returns
    ///
    /// - `Ok(Classification)`: Status and call latency
    /// - `Err(Error::Timeout)`: No answer within the timeout
    /// - `Err(Error::Classifier)`: Any other classifier failure
    pub async fn check_status(&self, domain: &str) -> Result<Classification> {
        let permit = self.spacer.acquire().await;
        self.call(domain, permit).await
    }

    /// Like [`check_status`](Self::check_status), but gives up while waiting
    /// for the call spacing if shutdown is requested
    ///
    /// Returns `None` when no call was issued. A call that already started
    /// runs to completion (bounded by the timeout).
    pub(crate) async fn check_status_unless_shutdown(
        &self,
        domain: &str,
        shutdown: &mut ShutdownSignal,
    ) -> Option<Result<Classification>> {
        if shutdown.is_triggered() {
            return None;
        }

        let permit = tokio::select! {
            biased;
            _ = shutdown.wait() => return None,
            permit = self.spacer.acquire() => permit,
        };

        Some(self.call(domain, permit).await)
    }

    async fn call(&self, domain: &str, _permit: CallPermit<'_>) -> Result<Classification> {
        let started = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, self.classifier.classify(domain)).await;
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(status)) => {
                debug!(
                    "Classifier {} answered {} for {} in {:?}",
                    self.classifier_name(),
                    status,
                    domain,
                    latency
                );
                Ok(Classification { status, latency })
            }
            Ok(Err(e @ (Error::Timeout { .. } | Error::Classifier(_)))) => Err(e),
            Ok(Err(other)) => Err(Error::classifier(format!(
                "{} failed for {}: {}",
                self.classifier_name(),
                domain,
                other
            ))),
            Err(_) => Err(Error::timeout(domain, self.timeout)),
        }
    }
}
