//! Error types for the domain monitoring system
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;

use thiserror::Error;

use crate::traits::UserId;

/// Result type alias for monitoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the domain monitoring system
#[derive(Error, Debug)]
pub enum Error {
    /// The user already holds the maximum number of subscriptions
    #[error("Subscription limit reached for user {user_id} (max {limit})")]
    CapacityExceeded {
        /// User that hit the limit
        user_id: UserId,
        /// Configured per-user limit
        limit: usize,
    },

    /// The (user, domain) subscription already exists
    #[error("User {user_id} is already subscribed to {domain}")]
    AlreadyExists {
        /// Subscribing user
        user_id: UserId,
        /// Subscribed domain
        domain: String,
    },

    /// The classifier did not answer in time
    #[error("Classifier timed out for {domain} after {after:?}")]
    Timeout {
        /// Domain being classified
        domain: String,
        /// Time waited before giving up
        after: Duration,
    },

    /// Malformed or error response from the classifier
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// The notification sink rejected or failed a delivery
    #[error("Delivery failure: {0}")]
    Delivery(String),

    /// Persistence layer failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (e.g. a malformed domain name)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sweep is already running
    #[error("A sweep is already in progress")]
    SweepInProgress,

    /// The engine has been shut down
    #[error("Engine is shutting down")]
    ShuttingDown,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a capacity error
    pub fn capacity_exceeded(user_id: UserId, limit: usize) -> Self {
        Self::CapacityExceeded { user_id, limit }
    }

    /// Create a duplicate subscription error
    pub fn already_exists(user_id: UserId, domain: impl Into<String>) -> Self {
        Self::AlreadyExists {
            user_id,
            domain: domain.into(),
        }
    }

    /// Create a classifier timeout error
    pub fn timeout(domain: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            domain: domain.into(),
            after,
        }
    }

    /// Create a classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the sweep may retry the classifier call that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Classifier(_))
    }

    /// Whether this error is meant to be shown to the user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::AlreadyExists { .. } | Self::InvalidInput(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
