//! Core traits for the domain monitoring system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Classifier`]: Query a domain's block status
//! - [`NotificationSink`]: Deliver a message to a user
//! - [`Store`]: Subscriptions, status cache and history

pub mod classifier;
pub mod notification_sink;
pub mod store;

pub use classifier::{Classification, Classifier, ClassifierFactory, DomainStatus};
pub use notification_sink::{Delivery, NotificationSink, NotificationSinkFactory};
pub use store::{
    CheckHistoryEntry, CheckSource, HistoryStore, StatusCache, StatusRecord, Store, StoreFactory,
    Subscription, SubscriptionStore, UserId,
};
