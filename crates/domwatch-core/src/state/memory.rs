// # Memory Store
//
// In-memory implementation of the store traits.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where subscriptions are
// re-created by the front end.
//
// ## Crash Behavior
//
// - All subscriptions, status records and history are lost on restart
// - The first sweep after a restart re-baselines every domain (no
//   notifications until the following sweep)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::tables::StoreTables;
use crate::config::{StoreConfig, StoreLimits};
use crate::traits::{
    CheckHistoryEntry, DomainStatus, HistoryStore, StatusCache, StatusRecord, Store, StoreFactory,
    Subscription, SubscriptionStore, UserId,
};
use crate::Error;

/// In-memory store implementation
///
/// All tables live behind a single `RwLock`. Reads never wait on a sweep
/// for longer than one table operation.
///
/// # Example
///
/// ```rust,no_run
/// use domwatch_core::state::MemoryStore;
/// use domwatch_core::traits::{SubscriptionStore, UserId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///
///     store.add(UserId(42), "example.com").await?;
///     assert_eq!(store.list_by_user(UserId(42)).await?.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreTables>>,
    limits: StoreLimits,
}

impl MemoryStore {
    /// Create a new empty memory store with default limits
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    /// Create a new empty memory store with explicit limits
    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreTables::default())),
            limits,
        }
    }

    /// Total number of active subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.inner.read().await.subscriptions.len()
    }

    /// Check if the store holds no subscriptions
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.subscriptions.is_empty()
    }

    /// Clear all tables
    pub async fn clear(&self) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        *guard = StoreTables::default();
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn add(&self, user_id: UserId, domain: &str) -> Result<Subscription, Error> {
        let mut guard = self.inner.write().await;
        guard.add_subscription(user_id, domain, &self.limits)
    }

    async fn remove(&self, user_id: UserId, domain: &str) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove_subscription(user_id, domain))
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.subscriptions_of(user_id))
    }

    async fn list_all_active(&self) -> Result<Vec<Subscription>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.subscriptions.clone())
    }

    async fn is_referenced(&self, domain: &str) -> Result<bool, Error> {
        let guard = self.inner.read().await;
        Ok(guard.is_referenced(domain))
    }
}

#[async_trait]
impl StatusCache for MemoryStore {
    async fn get(&self, domain: &str) -> Result<Option<StatusRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.statuses.get(domain).cloned())
    }

    async fn set(
        &self,
        domain: &str,
        status: DomainStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.set_status(domain, status, checked_at);
        Ok(())
    }

    async fn delete(&self, domain: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.statuses.remove(domain);
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.statuses.keys().cloned().collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, entry: &CheckHistoryEntry) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.append_history(entry, &self.limits);
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<CheckHistoryEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.recent_history(user_id, limit))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for creating memory stores
pub struct MemoryStoreFactory;

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn create(
        &self,
        config: &StoreConfig,
        limits: &StoreLimits,
    ) -> Result<Box<dyn Store>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryStore::with_limits(*limits))),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}
