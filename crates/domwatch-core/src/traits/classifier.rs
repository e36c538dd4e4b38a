// # Classifier Trait
//
// Defines the interface for querying a domain's block status from an
// external classification service.
//
// ## Implementations
//
// - HTTP JSON lookup: `domwatch-classifier-http` crate
// - Future: DNS-based resolvers, local blocklists
//
// ## Usage
//
// ```rust,ignore
// use domwatch_core::Classifier;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let classifier = /* Classifier implementation */;
//
//     let status = classifier.classify("example.com").await?;
//     println!("example.com is {status}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Block status of a domain as reported by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    /// The domain is blocked
    Blocked,
    /// The domain is reachable / not blocked
    NotBlocked,
    /// The classifier answered but could not decide
    Unknown,
}

impl DomainStatus {
    /// Map a boolean "blocked" verdict to a status
    pub fn from_blocked(blocked: bool) -> Self {
        if blocked {
            Self::Blocked
        } else {
            Self::NotBlocked
        }
    }

    /// Short status marker used in user-facing text
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Blocked => "🔴",
            Self::NotBlocked => "🟢",
            Self::Unknown => "⚪",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Blocked => "Blocked",
            Self::NotBlocked => "Not blocked",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Result of one successful classifier call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The reported status
    pub status: DomainStatus,
    /// Wall time the call took
    pub latency: Duration,
}

/// Trait for classifier implementations
///
/// A classifier answers a single question for a single domain. It is a
/// leaf component: it knows nothing about subscriptions, cached status or
/// scheduling.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform network calls to its own lookup endpoint
/// - ✅ Parse the service's response format
/// - ✅ Return success or failure (the sweep decides about retries)
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by the sweep runner)
/// - ❌ Enforce the call timeout (owned by `ClassifierClient`)
/// - ❌ Throttle calls (owned by the engine's global call spacing)
/// - ❌ Cache results (owned by the status cache)
/// - ❌ Spawn tasks
///
/// A classifier that retries internally would break the global call
/// spacing: the engine could no longer guarantee that two requests never
/// reach the external service closer together than the configured minimum.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Query the current status of `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(DomainStatus)`: The service's verdict
    /// - `Err(Error::Classifier)`: Transport failure, malformed or error response
    ///
    /// Any other error is reported by the engine as `Error::Classifier`.
    async fn classify(&self, domain: &str) -> Result<DomainStatus, crate::Error>;

    /// Get the classifier name (for logging/debugging)
    fn classifier_name(&self) -> &'static str;
}

/// Helper trait for constructing classifiers from configuration
pub trait ClassifierFactory: Send + Sync {
    /// Create a Classifier instance from configuration
    fn create(
        &self,
        config: &crate::config::ClassifierConfig,
    ) -> Result<Box<dyn Classifier>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_blocked() {
        assert_eq!(DomainStatus::from_blocked(true), DomainStatus::Blocked);
        assert_eq!(DomainStatus::from_blocked(false), DomainStatus::NotBlocked);
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&DomainStatus::NotBlocked).unwrap();
        assert_eq!(json, "\"not_blocked\"");
        let back: DomainStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(back, DomainStatus::Blocked);
    }
}
