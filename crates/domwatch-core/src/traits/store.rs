// # Store Traits
//
// Defines the persistence interface required by the engine.
//
// ## Purpose
//
// Three repository-style views over one persistent store:
// - `SubscriptionStore`: which users watch which domains (capacity enforced here)
// - `StatusCache`: last known status per domain, shared across users
// - `HistoryStore`: append-only audit trail of checks
//
// `Store` bundles the three so the engine holds a single handle.
//
// ## Consistency
//
// The sweep is the only writer of the status cache. Readers may observe a
// status update mid-sweep; no isolation is provided across a whole sweep.
//
// ## Implementations
//
// - In-memory: `MemoryStore`
// - JSON snapshot file: `FileStore`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::classifier::DomainStatus;

/// Opaque user identifier (the chat/user id of the notification transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's subscription to a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscribing user
    pub user_id: UserId,
    /// Normalized domain name
    pub domain: String,
    /// When the subscription was created
    pub created_at: DateTime<Utc>,
}

/// Last known status of a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Domain name
    pub domain: String,
    /// Last status the sweep observed
    pub last_status: DomainStatus,
    /// When that status was last confirmed
    pub last_checked_at: DateTime<Utc>,
}

/// What produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSource {
    /// Scheduled or manual sweep
    Sweep,
    /// One-off user check
    AdHoc,
}

/// One entry of the check audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHistoryEntry {
    /// User the entry belongs to
    pub user_id: UserId,
    /// Checked domain
    pub domain: String,
    /// Observed status
    pub status: DomainStatus,
    /// When the check happened
    pub checked_at: DateTime<Utc>,
    /// What triggered the check
    pub source: CheckSource,
}

/// Per-user subscriptions with capacity enforcement
///
/// The per-user cap is an invariant of the store: `add` checks it, so no
/// caller can bypass it.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Add a subscription
    ///
    /// # Returns
    ///
    /// - `Ok(Subscription)`: Created
    /// - `Err(Error::AlreadyExists)`: The pair already exists
    /// - `Err(Error::CapacityExceeded)`: The user is at the cap; nothing changes
    /// - `Err(Error::Store)`: Storage error
    async fn add(&self, user_id: UserId, domain: &str) -> Result<Subscription, crate::Error>;

    /// Remove a subscription
    ///
    /// Idempotent: removing a missing pair is a no-op.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if something was removed, `Ok(false)` otherwise
    async fn remove(&self, user_id: UserId, domain: &str) -> Result<bool, crate::Error>;

    /// List a user's subscriptions, oldest first
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>, crate::Error>;

    /// Snapshot of every active subscription
    async fn list_all_active(&self) -> Result<Vec<Subscription>, crate::Error>;

    /// Whether any subscription references `domain`
    async fn is_referenced(&self, domain: &str) -> Result<bool, crate::Error>;
}

/// Last-known status per domain
#[async_trait]
pub trait StatusCache: Send + Sync {
    /// Get the record for `domain`; `None` means "never checked"
    async fn get(&self, domain: &str) -> Result<Option<StatusRecord>, crate::Error>;

    /// Create or overwrite the record for `domain`
    async fn set(
        &self,
        domain: &str,
        status: DomainStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), crate::Error>;

    /// Delete the record for `domain` (no-op if absent)
    async fn delete(&self, domain: &str) -> Result<(), crate::Error>;

    /// All domains that currently have a record
    async fn list_domains(&self) -> Result<Vec<String>, crate::Error>;
}

/// Append-only check history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append an entry
    async fn append(&self, entry: &CheckHistoryEntry) -> Result<(), crate::Error>;

    /// Most recent entries for a user, newest first
    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<CheckHistoryEntry>, crate::Error>;
}

/// The full persistence interface required by the engine
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Lock internally for thread safety
/// - ✅ Buffer writes in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Decide when a status changed (owned by the sweep runner)
/// - ❌ Call the classifier or the notification sink
/// - ❌ Spawn background tasks
#[async_trait]
pub trait Store: SubscriptionStore + StatusCache + HistoryStore {
    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing stores from configuration
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Create a Store instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
        limits: &crate::config::StoreLimits,
    ) -> Result<Box<dyn Store>, crate::Error>;
}
