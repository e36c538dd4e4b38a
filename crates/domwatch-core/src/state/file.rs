// # File Store
//
// JSON-snapshot implementation of the store traits with crash recovery.
//
// ## Purpose
//
// Keeps the whole store in memory and persists it as one JSON document,
// so subscriptions and the status baseline survive daemon restarts.
//
// ## Write Policy
//
// - Subscription changes are written immediately (a user's add/remove is
//   durable once acknowledged). The change is applied to a copy first and
//   only becomes visible once that copy is on disk, so a failed write
//   leaves the store as it was
// - Status and history updates mark the store dirty and are written on
//   `flush()`, which the engine calls after every sweep and on shutdown
// - Disk I/O never holds the table lock: readers are not blocked by a
//   write in progress
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Automatic backup: keeps `.backup` of the previous snapshot
// - Recovery: falls back to the backup if the main file is corrupted
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "subscriptions": [
//     { "user_id": 42, "domain": "example.com", "created_at": "2025-01-09T12:00:00Z" }
//   ],
//   "statuses": {
//     "example.com": {
//       "domain": "example.com",
//       "last_status": "blocked",
//       "last_checked_at": "2025-01-09T12:00:00Z"
//     }
//   },
//   "history": []
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use super::tables::StoreTables;
use crate::config::{StoreConfig, StoreLimits};
use crate::traits::{
    CheckHistoryEntry, DomainStatus, HistoryStore, StatusCache, StatusRecord, Store, StoreFactory,
    Subscription, SubscriptionStore, UserId,
};
use crate::Error;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use domwatch_core::state::FileStore;
/// use domwatch_core::traits::{SubscriptionStore, UserId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/domwatch/store.json").await?;
///
///     // Written to disk before returning
///     store.add(UserId(42), "example.com").await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    limits: StoreLimits,
    /// Serializes snapshot writes (and with them, subscription changes)
    persist_lock: Mutex<()>,
}

/// Internal state for file-based store
#[derive(Debug)]
struct FileState {
    tables: StoreTables,
    dirty: bool,
    /// Bumped on every unwritten change
    generation: u64,
}

impl FileState {
    fn touch(&mut self) {
        self.dirty = true;
        self.generation += 1;
    }
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(flatten)]
    tables: StoreTables,
}

impl FileStore {
    /// Create or load a file store with default limits
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::with_limits(path, StoreLimits::default()).await
    }

    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load the existing store file
    /// 2. If corruption is detected, try to load the backup
    /// 3. If both fail, start empty
    /// 4. Create parent directories if needed
    pub async fn with_limits<P: AsRef<Path>>(path: P, limits: StoreLimits) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tables = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                tables,
                dirty: false,
                generation: 0,
            })),
            limits,
            persist_lock: Mutex::new(()),
        })
    }

    /// Load the store with automatic recovery
    async fn load_with_recovery(path: &Path) -> Result<StoreTables, Error> {
        let err = match Self::load(path).await {
            Ok(tables) => {
                tracing::debug!(
                    "Loaded store from file: {} subscription(s), {} status record(s)",
                    tables.subscriptions.len(),
                    tables.statuses.len()
                );
                return Ok(tables);
            }
            // Read failures (permissions, I/O) are not corruption
            Err(e @ Error::Io(_)) => return Err(e),
            Err(e) => e,
        };

        tracing::warn!(
            "Store file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty store.");
            return Ok(StoreTables::default());
        }

        match Self::load(&backup_path).await {
            Ok(tables) => {
                tracing::info!(
                    "Recovered store from backup: {} subscription(s)",
                    tables.subscriptions.len()
                );
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore store file from backup: {}", restore_err);
                }
                Ok(tables)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty store.",
                    backup_err
                );
                Ok(StoreTables::default())
            }
        }
    }

    /// Load tables from a file; a missing file is an empty store
    async fn load(path: &Path) -> Result<StoreTables, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(StoreTables::default());
        }

        let content = fs::read_to_string(path).await?;

        let file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::store(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            ))
        })?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.tables)
    }

    /// Copy the tables together with their generation
    async fn snapshot(&self) -> (StoreTables, u64) {
        let state = self.state.read().await;
        (state.tables.clone(), state.generation)
    }

    /// Clear the dirty flag unless something changed after `generation`
    async fn mark_clean(&self, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation == generation {
            state.dirty = false;
        }
    }

    /// Write `tables` to disk atomically
    ///
    /// Callers hold `persist_lock`; the table lock is not held.
    async fn persist(&self, tables: &StoreTables) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            tables: tables.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut handle = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            handle.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            handle.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Persist a changed copy of the subscriptions, then publish it
    ///
    /// Status and history changes made while the copy is written stay
    /// dirty and go out with the next flush.
    async fn commit_subscriptions(
        &self,
        candidate: StoreTables,
        generation: u64,
    ) -> Result<(), Error> {
        self.persist(&candidate).await?;

        let mut state = self.state.write().await;
        state.tables.subscriptions = candidate.subscriptions;
        if state.generation == generation {
            state.dirty = false;
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Whether there are unwritten status/history changes
    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.dirty
    }
}

#[async_trait]
impl SubscriptionStore for FileStore {
    async fn add(&self, user_id: UserId, domain: &str) -> Result<Subscription, Error> {
        let _persist = self.persist_lock.lock().await;

        let (mut candidate, generation) = self.snapshot().await;
        let subscription = candidate.add_subscription(user_id, domain, &self.limits)?;

        self.commit_subscriptions(candidate, generation).await?;
        Ok(subscription)
    }

    async fn remove(&self, user_id: UserId, domain: &str) -> Result<bool, Error> {
        let _persist = self.persist_lock.lock().await;

        let (mut candidate, generation) = self.snapshot().await;
        if !candidate.remove_subscription(user_id, domain) {
            return Ok(false);
        }

        self.commit_subscriptions(candidate, generation).await?;
        Ok(true)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>, Error> {
        let state = self.state.read().await;
        Ok(state.tables.subscriptions_of(user_id))
    }

    async fn list_all_active(&self) -> Result<Vec<Subscription>, Error> {
        let state = self.state.read().await;
        Ok(state.tables.subscriptions.clone())
    }

    async fn is_referenced(&self, domain: &str) -> Result<bool, Error> {
        let state = self.state.read().await;
        Ok(state.tables.is_referenced(domain))
    }
}

#[async_trait]
impl StatusCache for FileStore {
    async fn get(&self, domain: &str) -> Result<Option<StatusRecord>, Error> {
        let state = self.state.read().await;
        Ok(state.tables.statuses.get(domain).cloned())
    }

    async fn set(
        &self,
        domain: &str,
        status: DomainStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.tables.set_status(domain, status, checked_at);
        state.touch();
        Ok(())
    }

    async fn delete(&self, domain: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if state.tables.statuses.remove(domain).is_some() {
            state.touch();
        }
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        Ok(state.tables.statuses.keys().cloned().collect())
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    async fn append(&self, entry: &CheckHistoryEntry) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.tables.append_history(entry, &self.limits);
        state.touch();
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<CheckHistoryEntry>, Error> {
        let state = self.state.read().await;
        Ok(state.tables.recent_history(user_id, limit))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn flush(&self) -> Result<(), Error> {
        let _persist = self.persist_lock.lock().await;
        if !self.is_dirty().await {
            return Ok(());
        }

        let (tables, generation) = self.snapshot().await;
        self.persist(&tables).await?;
        self.mark_clean(generation).await;
        Ok(())
    }
}

/// Factory for creating file stores
pub struct FileStoreFactory;

#[async_trait]
impl StoreFactory for FileStoreFactory {
    async fn create(
        &self,
        config: &StoreConfig,
        limits: &StoreLimits,
    ) -> Result<Box<dyn Store>, Error> {
        match config {
            StoreConfig::File { path } => {
                Ok(Box::new(FileStore::with_limits(path, *limits).await?))
            }
            _ => Err(Error::config("Invalid config for file store")),
        }
    }
}
