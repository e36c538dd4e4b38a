//! Environment configuration
//!
//! The daemon is configured through environment variables only. Values are
//! read through a lookup function so parsing can be tested without touching
//! the process environment.

use anyhow::{Context, Result, bail};
use domwatch_core::config::{
    ClassifierConfig, EngineConfig, MonitorConfig, ScheduleConfig, SinkConfig, StoreConfig,
    StoreLimits,
};
use std::env;
use std::str::FromStr;

/// Default classifier endpoint
const DEFAULT_CLASSIFIER_URL: &str = "https://check.skiddle.id/";

/// Daemon configuration
pub struct Config {
    pub classifier_url: String,
    pub sink_type: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_parse_mode: Option<String>,
    pub store_type: String,
    pub store_path: Option<String>,
    pub schedule_enabled: bool,
    pub sweep_time: String,
    pub utc_offset_minutes: i32,
    pub min_call_spacing_ms: u64,
    pub classifier_timeout_secs: u64,
    pub max_retries: usize,
    pub max_subscriptions: usize,
    pub shutdown_grace_secs: u64,
    pub log_level: String,
    pub sweep_on_start: bool,
}

// Keep the bot token out of debug output
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("classifier_url", &self.classifier_url)
            .field("sink_type", &self.sink_type)
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("store_type", &self.store_type)
            .field("store_path", &self.store_path)
            .field("sweep_time", &self.sweep_time)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let engine = EngineConfig::default();
        let limits = StoreLimits::default();

        Ok(Self {
            classifier_url: lookup("DOMWATCH_CLASSIFIER_URL")
                .unwrap_or_else(|| DEFAULT_CLASSIFIER_URL.to_string()),
            sink_type: lookup("DOMWATCH_SINK_TYPE").unwrap_or_else(|| "telegram".to_string()),
            telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()),
            telegram_parse_mode: lookup("TELEGRAM_PARSE_MODE").filter(|m| !m.is_empty()),
            store_type: lookup("DOMWATCH_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            store_path: lookup("DOMWATCH_STORE_PATH"),
            schedule_enabled: parse_or(&lookup, "DOMWATCH_SCHEDULE_ENABLED", true)?,
            sweep_time: lookup("DOMWATCH_SWEEP_TIME").unwrap_or_else(|| "09:00".to_string()),
            utc_offset_minutes: parse_or(&lookup, "DOMWATCH_UTC_OFFSET_MINUTES", 0)?,
            min_call_spacing_ms: parse_or(
                &lookup,
                "DOMWATCH_MIN_CALL_SPACING_MS",
                engine.min_call_spacing_ms,
            )?,
            classifier_timeout_secs: parse_or(
                &lookup,
                "DOMWATCH_CLASSIFIER_TIMEOUT_SECS",
                engine.classifier_timeout_secs,
            )?,
            max_retries: parse_or(&lookup, "DOMWATCH_MAX_RETRIES", engine.max_retries)?,
            max_subscriptions: parse_or(
                &lookup,
                "DOMWATCH_MAX_SUBSCRIPTIONS",
                limits.max_subscriptions_per_user,
            )?,
            shutdown_grace_secs: parse_or(
                &lookup,
                "DOMWATCH_SHUTDOWN_GRACE_SECS",
                engine.shutdown_grace_secs,
            )?,
            log_level: lookup("DOMWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            sweep_on_start: parse_or(&lookup, "DOMWATCH_SWEEP_ON_START", false)?,
        })
    }

    /// Validate the configuration
    ///
    /// Checks what the environment alone can get wrong (missing secrets,
    /// unknown types, out-of-range numbers), then defers to the core
    /// configuration's own validation.
    pub fn validate(&self) -> Result<()> {
        match self.sink_type.as_str() {
            "telegram" => {
                if self.telegram_bot_token.is_none() {
                    bail!(
                        "TELEGRAM_BOT_TOKEN is required when DOMWATCH_SINK_TYPE=telegram. \
                        Set it via: export TELEGRAM_BOT_TOKEN=your_token"
                    );
                }
            }
            "log" => {}
            other => bail!(
                "DOMWATCH_SINK_TYPE '{}' is not supported. Supported types: telegram, log",
                other
            ),
        }

        match self.store_type.as_str() {
            "file" => match self.store_path.as_deref() {
                None | Some("") => bail!(
                    "DOMWATCH_STORE_PATH is required when DOMWATCH_STORE_TYPE=file. \
                    Set it via: export DOMWATCH_STORE_PATH=/var/lib/domwatch/store.json"
                ),
                Some(_) => {}
            },
            "memory" => {}
            other => bail!(
                "DOMWATCH_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        }

        if !(1..=120).contains(&self.classifier_timeout_secs) {
            bail!(
                "DOMWATCH_CLASSIFIER_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                self.classifier_timeout_secs
            );
        }

        if self.max_subscriptions == 0 {
            bail!("DOMWATCH_MAX_SUBSCRIPTIONS must be at least 1");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => bail!(
                "DOMWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_monitor_config()
            .validate()
            .context("Invalid monitor configuration")?;

        Ok(())
    }

    /// Build the core monitor configuration
    pub fn to_monitor_config(&self) -> MonitorConfig {
        let sink = match self.sink_type.as_str() {
            "telegram" => SinkConfig::Telegram {
                bot_token: self.telegram_bot_token.clone().unwrap_or_default(),
                parse_mode: self.telegram_parse_mode.clone(),
            },
            _ => SinkConfig::Log,
        };

        let store = match self.store_type.as_str() {
            "file" => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
            _ => StoreConfig::Memory,
        };

        MonitorConfig {
            classifier: ClassifierConfig::Http {
                endpoint: self.classifier_url.clone(),
                connect_timeout_secs: 5,
            },
            sink,
            store,
            limits: StoreLimits {
                max_subscriptions_per_user: self.max_subscriptions,
                ..StoreLimits::default()
            },
            schedule: ScheduleConfig {
                enabled: self.schedule_enabled,
                sweep_time: self.sweep_time.clone(),
                utc_offset_minutes: self.utc_offset_minutes,
            },
            engine: EngineConfig {
                classifier_timeout_secs: self.classifier_timeout_secs,
                min_call_spacing_ms: self.min_call_spacing_ms,
                max_retries: self.max_retries,
                shutdown_grace_secs: self.shutdown_grace_secs,
                ..EngineConfig::default()
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
    }
}
