//! Plugin-based component registry
//!
//! The registry allows classifiers, notification sinks and stores to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use domwatch_core::registry::ComponentRegistry;
//! use domwatch_core::config::SinkConfig;
//!
//! // Built-in stores and the log sink are pre-registered
//! let registry = ComponentRegistry::with_builtins();
//!
//! // Register plugins
//! domwatch_sink_telegram::register(&registry);
//!
//! // Create a sink from config
//! let sink = registry.create_sink(&SinkConfig::Log)?;
//! ```
//!
//! ## Registration
//!
//! Plugin crates expose a `register` function:
//!
//! ```rust,ignore
//! # use domwatch_core::registry::ComponentRegistry;
//! // In domwatch-classifier-http
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_classifier("http", Box::new(HttpClassifierFactory));
//! }
//! ```

use crate::config::{ClassifierConfig, SinkConfig, StoreConfig, StoreLimits};
use crate::error::{Error, Result};
use crate::sinks::LogSinkFactory;
use crate::state::{FileStoreFactory, MemoryStoreFactory};
use crate::traits::{Classifier, NotificationSink, Store};
use crate::traits::{ClassifierFactory, NotificationSinkFactory, StoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for plugin-based component creation
///
/// Maps type names (as used in configuration) to factory objects.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered classifier factories
    classifiers: RwLock<HashMap<String, Box<dyn ClassifierFactory>>>,

    /// Registered notification sink factories
    sinks: RwLock<HashMap<String, Box<dyn NotificationSinkFactory>>>,

    /// Registered store factories
    stores: RwLock<HashMap<String, Arc<dyn StoreFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in components registered
    ///
    /// - stores: `memory`, `file`
    /// - sinks: `log`
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryStoreFactory));
        registry.register_store("file", Box::new(FileStoreFactory));
        registry.register_sink("log", Box::new(LogSinkFactory));
        registry
    }

    /// Register a classifier factory
    ///
    /// # Parameters
    ///
    /// - `name`: Classifier type name (e.g., "http")
    /// - `factory`: Factory object for creating classifier instances
    pub fn register_classifier(&self, name: impl Into<String>, factory: Box<dyn ClassifierFactory>) {
        self.classifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a notification sink factory
    ///
    /// # Parameters
    ///
    /// - `name`: Sink type name (e.g., "telegram", "log")
    /// - `factory`: Factory object for creating sink instances
    pub fn register_sink(&self, name: impl Into<String>, factory: Box<dyn NotificationSinkFactory>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn StoreFactory>) {
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a classifier from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Classifier>)`: Created classifier
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_classifier(&self, config: &ClassifierConfig) -> Result<Box<dyn Classifier>> {
        let classifier_type = config.type_name();
        let classifiers = self.classifiers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = classifiers.get(classifier_type).ok_or_else(|| {
            Error::config(format!("Unknown classifier type: {}", classifier_type))
        })?;

        factory.create(config)
    }

    /// Create a notification sink from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn NotificationSink>)`: Created sink
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_sink(&self, config: &SinkConfig) -> Result<Box<dyn NotificationSink>> {
        let sink_type = config.type_name();
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sinks
            .get(sink_type)
            .ok_or_else(|| Error::config(format!("Unknown sink type: {}", sink_type)))?;

        factory.create(config)
    }

    /// Create a store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Store>)`: Created store (loaded, for persistent stores)
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub async fn create_store(
        &self,
        config: &StoreConfig,
        limits: &StoreLimits,
    ) -> Result<Box<dyn Store>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config, limits).await
    }

    /// List all registered classifier types
    pub fn list_classifiers(&self) -> Vec<String> {
        let classifiers = self.classifiers.read().unwrap_or_else(PoisonError::into_inner);
        classifiers.keys().cloned().collect()
    }

    /// List all registered sink types
    pub fn list_sinks(&self) -> Vec<String> {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a classifier type is registered
    pub fn has_classifier(&self, name: &str) -> bool {
        let classifiers = self.classifiers.read().unwrap_or_else(PoisonError::into_inner);
        classifiers.contains_key(name)
    }

    /// Check if a sink type is registered
    pub fn has_sink(&self, name: &str) -> bool {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockClassifierFactory;

    impl ClassifierFactory for MockClassifierFactory {
        fn create(&self, _config: &ClassifierConfig) -> Result<Box<dyn Classifier>> {
            Err(Error::config("Mock classifier not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ComponentRegistry::new();

        assert!(!registry.has_classifier("mock"));

        registry.register_classifier("mock", Box::new(MockClassifierFactory));

        assert!(registry.has_classifier("mock"));
        assert!(registry.list_classifiers().contains(&"mock".to_string()));
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ComponentRegistry::with_builtins();
        assert!(registry.has_store("memory"));
        assert!(registry.has_store("file"));
        assert!(registry.has_sink("log"));
        assert!(!registry.has_sink("telegram"));
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let registry = ComponentRegistry::new();
        let err = registry
            .create_classifier(&ClassifierConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let registry = ComponentRegistry::with_builtins();
        let store = registry
            .create_store(&StoreConfig::Memory, &StoreLimits::default())
            .await
            .unwrap();
        assert!(store.list_all_active().await.unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_store_type() {
        let registry = ComponentRegistry::new();
        let result = tokio_test::block_on(
            registry.create_store(&StoreConfig::Memory, &StoreLimits::default()),
        );
        let err = result.err().unwrap();
        assert!(err.to_string().contains("memory"));
    }
}
