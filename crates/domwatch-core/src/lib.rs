// # domwatch-core
//
// Core library for the domain status monitoring and notification system.
//
// ## Architecture Overview
//
// Users subscribe to domains; once a day every subscribed domain is checked
// against an external block-status classifier, and subscribers are notified
// when a domain's status changes.
//
// - **Classifier**: Trait for querying a domain's block status
// - **NotificationSink**: Trait for delivering messages to users
// - **Store**: Trait for subscriptions, last-known statuses and history
// - **DomainMonitor**: Core engine running sweeps and serving user operations
// - **Scheduler**: Fires the daily sweep
// - **ComponentRegistry**: Plugin-based registry for classifiers, sinks, stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from transports
// 2. **Transition-Driven**: Only status changes notify, never first observations
// 3. **Plugin-Based**: Components are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Isolation**: One domain's or one user's failure never affects another

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod sinks;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ClassifierConfig, MonitorConfig, SinkConfig, StoreConfig};
pub use engine::{DomainMonitor, MonitorEvent, SweepSummary};
pub use error::{Error, Result};
pub use registry::ComponentRegistry;
pub use scheduler::{DailySchedule, Scheduler, SchedulerHandle};
pub use state::{FileStore, MemoryStore};
pub use traits::{Classifier, DomainStatus, NotificationSink, Store, UserId};
