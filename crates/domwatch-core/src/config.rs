//! Configuration types for the domain monitoring system
//!
//! This module defines all configuration structures used throughout the crate.

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Classifier configuration
    pub classifier: ClassifierConfig,

    /// Notification sink configuration
    pub sink: SinkConfig,

    /// Store configuration
    pub store: StoreConfig,

    /// Store limits (per-user caps)
    #[serde(default)]
    pub limits: StoreLimits,

    /// Daily sweep schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            sink: SinkConfig::default(),
            store: StoreConfig::default(),
            limits: StoreLimits::default(),
            schedule: ScheduleConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.classifier.validate()?;
        self.sink.validate()?;
        self.store.validate()?;
        self.limits.validate()?;
        self.schedule.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierConfig {
    /// HTTP JSON lookup endpoint
    Http {
        /// Endpoint URL; the domain is passed as `?domains=<domain>`
        endpoint: String,
        /// TCP connect timeout in seconds
        #[serde(default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,
    },

    /// Custom classifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ClassifierConfig {
    /// Validate the classifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ClassifierConfig::Http { endpoint, .. } => {
                if endpoint.is_empty() {
                    return Err(crate::Error::config("Classifier endpoint cannot be empty"));
                }
                if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Classifier endpoint must use HTTP or HTTPS scheme. Got: {}",
                        endpoint
                    )));
                }
                Ok(())
            }
            ClassifierConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom classifier factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the classifier type name
    pub fn type_name(&self) -> &str {
        match self {
            ClassifierConfig::Http { .. } => "http",
            ClassifierConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig::Http {
            endpoint: "https://check.skiddle.id/".to_string(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Notification sink configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Telegram Bot API
    Telegram {
        /// Bot token
        bot_token: String,
        /// Optional parse mode (HTML, Markdown, MarkdownV2)
        #[serde(default)]
        parse_mode: Option<String>,
    },

    /// Write notifications to the log only
    #[default]
    Log,

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

// Keep bot tokens out of debug output
impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkConfig::Telegram { parse_mode, .. } => f
                .debug_struct("Telegram")
                .field("bot_token", &"<REDACTED>")
                .field("parse_mode", parse_mode)
                .finish(),
            SinkConfig::Log => f.write_str("Log"),
            SinkConfig::Custom { factory, config } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", config)
                .finish(),
        }
    }
}

impl SinkConfig {
    /// Validate the sink configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SinkConfig::Telegram { bot_token, .. } => {
                if bot_token.is_empty() {
                    return Err(crate::Error::config("Telegram bot token cannot be empty"));
                }
                Ok(())
            }
            SinkConfig::Log => Ok(()),
            SinkConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom sink factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            SinkConfig::Telegram { .. } => "telegram",
            SinkConfig::Log => "log",
            SinkConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON snapshot file
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Store file path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Capacity limits enforced by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLimits {
    /// Maximum active subscriptions per user
    #[serde(default = "default_max_subscriptions_per_user")]
    pub max_subscriptions_per_user: usize,

    /// History entries retained per user (oldest dropped first)
    #[serde(default = "default_max_history_per_user")]
    pub max_history_per_user: usize,
}

impl StoreLimits {
    /// Validate the limits
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_subscriptions_per_user == 0 {
            return Err(crate::Error::config("max_subscriptions_per_user must be > 0"));
        }
        if self.max_history_per_user == 0 {
            return Err(crate::Error::config("max_history_per_user must be > 0"));
        }
        Ok(())
    }
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_subscriptions_per_user: default_max_subscriptions_per_user(),
            max_history_per_user: default_max_history_per_user(),
        }
    }
}

/// Daily sweep schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the daily trigger is registered at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Wall-clock time of the daily sweep, `HH:MM`
    #[serde(default = "default_sweep_time")]
    pub sweep_time: String,

    /// Offset of the wall clock from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl ScheduleConfig {
    /// Parse the configured sweep time
    pub fn sweep_time(&self) -> Result<NaiveTime, crate::Error> {
        NaiveTime::parse_from_str(&self.sweep_time, "%H:%M").map_err(|e| {
            crate::Error::config(format!(
                "Invalid sweep time '{}' (expected HH:MM): {}",
                self.sweep_time, e
            ))
        })
    }

    /// The configured wall-clock offset
    pub fn offset(&self) -> Result<FixedOffset, crate::Error> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                crate::Error::config(format!(
                    "UTC offset out of range: {} minutes",
                    self.utc_offset_minutes
                ))
            })
    }

    /// Validate the schedule configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.sweep_time()?;
        self.offset()?;
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_time: default_sweep_time(),
            utc_offset_minutes: 0,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-call classifier timeout (in seconds)
    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,

    /// Minimum spacing between two classifier calls (in milliseconds)
    ///
    /// Enforced globally: sweeps and ad-hoc checks share one quota.
    #[serde(default = "default_min_call_spacing_ms")]
    pub min_call_spacing_ms: u64,

    /// Classifier retries per domain per sweep (0 or 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Capacity of the monitor event channel
    ///
    /// When full, events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the notification queue between sweep and notifier
    ///
    /// When full, the sweep waits for space; tasks are never dropped.
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,

    /// Maximum deliveries in flight at once
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    /// Time allowed for draining notifications on shutdown (in seconds)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Default number of history entries returned to users
    #[serde(default = "default_history_display_limit")]
    pub history_display_limit: usize,
}

impl EngineConfig {
    /// Per-call classifier timeout
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    /// Minimum spacing between classifier calls
    pub fn min_call_spacing(&self) -> Duration {
        Duration::from_millis(self.min_call_spacing_ms)
    }

    /// Shutdown drain budget
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.classifier_timeout_secs == 0 {
            return Err(crate::Error::config("classifier_timeout_secs must be > 0"));
        }
        if self.max_retries > 1 {
            return Err(crate::Error::config(format!(
                "max_retries must be 0 or 1. Got: {}",
                self.max_retries
            )));
        }
        if self.event_channel_capacity == 0 || self.notification_queue_capacity == 0 {
            return Err(crate::Error::config("channel capacities must be > 0"));
        }
        if self.max_concurrent_deliveries == 0 {
            return Err(crate::Error::config("max_concurrent_deliveries must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier_timeout_secs: default_classifier_timeout_secs(),
            min_call_spacing_ms: default_min_call_spacing_ms(),
            max_retries: default_max_retries(),
            event_channel_capacity: default_event_channel_capacity(),
            notification_queue_capacity: default_notification_queue_capacity(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            history_display_limit: default_history_display_limit(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_max_subscriptions_per_user() -> usize {
    10
}

fn default_max_history_per_user() -> usize {
    500
}

fn default_enabled() -> bool {
    true
}

fn default_sweep_time() -> String {
    "09:00".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    15
}

fn default_min_call_spacing_ms() -> u64 {
    1000
}

fn default_max_retries() -> usize {
    1
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_notification_queue_capacity() -> usize {
    1000
}

fn default_max_concurrent_deliveries() -> usize {
    8
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_history_display_limit() -> usize {
    20
}
