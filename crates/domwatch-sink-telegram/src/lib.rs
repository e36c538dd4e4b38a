// # Telegram Notification Sink
//
// This crate delivers status-change notifications through the Telegram
// Bot API (`POST /bot<token>/sendMessage`). The user id is the chat id.
//
// ## Trust Level: Untrusted (Notification Sink)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS calls to the Bot API only
// - ✅ Map API answers to accepted / rejected / failed
//
// **Forbidden Capabilities**:
// - ❌ Retry, back off or honor `retry_after` (delivery is at-most-once,
//   owned by the notifier)
// - ❌ Split or rewrite messages (the notifier truncates to
//   `max_message_len` before calling)
// - ❌ Spawn tasks or keep state between deliveries
//
// ## Answer Mapping
//
// | Bot API answer          | Result                           |
// |-------------------------|----------------------------------|
// | 2xx                     | `Ok(Delivery::Accepted)`         |
// | 400, 403                | `Ok(Delivery::Rejected)`         |
// | 401, 404                | `Err(Error::Delivery)` (token)   |
// | 429, 5xx, network error | `Err(Error::Delivery)`           |
//
// ## Security Requirements
//
// - The bot token NEVER appears in logs or error messages
// - The token is part of the request URL, so transport errors are
//   stripped of their URL before being reported

use async_trait::async_trait;
use domwatch_core::ComponentRegistry;
use domwatch_core::config::SinkConfig;
use domwatch_core::traits::{Delivery, NotificationSink, NotificationSinkFactory, UserId};
use domwatch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram Bot API base URL
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram `sendMessage` text limit (characters)
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: Option<String>,
}

/// Telegram notification sink
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the bot token.
pub struct TelegramSink {
    /// Bot token
    /// ⚠️ NEVER log this value
    bot_token: String,

    /// Optional parse mode (HTML, Markdown, MarkdownV2)
    parse_mode: Option<String>,

    /// API base URL (overridable for self-hosted Bot API servers)
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the bot token
impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("bot_token", &"<REDACTED>")
            .field("parse_mode", &self.parse_mode)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TelegramSink {
    /// Create a new Telegram sink
    ///
    /// # Parameters
    ///
    /// - `bot_token`: Bot token from @BotFather
    /// - `parse_mode`: Optional message parse mode
    pub fn new(bot_token: impl Into<String>, parse_mode: Option<String>) -> Result<Self> {
        Self::with_api_base(bot_token, parse_mode, TELEGRAM_API_BASE)
    }

    /// Create a sink talking to a different Bot API server
    pub fn with_api_base(
        bot_token: impl Into<String>,
        parse_mode: Option<String>,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.is_empty() {
            return Err(Error::config("Telegram bot token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            bot_token,
            parse_mode,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

/// Map a Bot API answer to a delivery outcome
pub fn interpret_response(status: u16, body: &str) -> Result<Delivery> {
    if (200..300).contains(&status) {
        return Ok(Delivery::Accepted);
    }

    let description = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.description)
        .unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        // Per-chat problems: blocked bot, unknown chat, bad text
        400 | 403 => Ok(Delivery::Rejected {
            reason: description,
        }),
        401 | 404 => Err(Error::delivery(format!(
            "Telegram authentication failed (check the bot token): {}",
            description
        ))),
        429 => Err(Error::delivery(format!(
            "Telegram rate limit exceeded: {}",
            description
        ))),
        _ => Err(Error::delivery(format!(
            "Telegram sendMessage failed: {} - {}",
            status, description
        ))),
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn deliver(&self, user_id: UserId, text: &str) -> Result<Delivery> {
        let payload = SendMessage {
            chat_id: user_id.0,
            text,
            parse_mode: self.parse_mode.as_deref(),
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::delivery(format!("Telegram request failed: {}", e.without_url()))
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let outcome = interpret_response(status, &body);
        if let Ok(Delivery::Rejected { reason }) = &outcome {
            tracing::debug!("Telegram rejected message to chat {}: {}", user_id, reason);
        }
        outcome
    }

    fn max_message_len(&self) -> Option<usize> {
        Some(TELEGRAM_MESSAGE_LIMIT)
    }

    fn sink_name(&self) -> &'static str {
        "telegram"
    }
}

/// Factory for creating Telegram sinks
pub struct TelegramSinkFactory;

impl NotificationSinkFactory for TelegramSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn NotificationSink>> {
        match config {
            SinkConfig::Telegram {
                bot_token,
                parse_mode,
            } => Ok(Box::new(TelegramSink::new(
                bot_token.clone(),
                parse_mode.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Telegram sink")),
        }
    }
}

/// Register the Telegram sink with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_sink("telegram", Box::new(TelegramSinkFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let config = SinkConfig::Telegram {
            bot_token: "123:abc".to_string(),
            parse_mode: None,
        };
        let sink = TelegramSinkFactory.create(&config).unwrap();
        assert_eq!(sink.sink_name(), "telegram");
        assert_eq!(sink.max_message_len(), Some(TELEGRAM_MESSAGE_LIMIT));
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        assert!(TelegramSinkFactory.create(&SinkConfig::Log).is_err());
    }

    #[test]
    fn test_empty_token_is_config_error() {
        let err = TelegramSink::new("", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let sink = TelegramSink::new("123:super-secret", Some("HTML".to_string())).unwrap();
        let debug = format!("{:?}", sink);
        assert!(debug.contains("TelegramSink"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_send_message_url() {
        let sink = TelegramSink::with_api_base("123:abc", None, "http://localhost:8081/").unwrap();
        assert_eq!(sink.send_message_url(), "http://localhost:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn test_payload_shape() {
        let payload = SendMessage {
            chat_id: 42,
            text: "hello",
            parse_mode: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 42, "text": "hello"}));
    }

    #[test]
    fn test_interpret_success() {
        let body = r#"{"ok":true,"result":{"message_id":1}}"#;
        assert_eq!(interpret_response(200, body).unwrap(), Delivery::Accepted);
    }

    #[test]
    fn test_interpret_blocked_user_is_rejection() {
        let body = r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#;
        assert_eq!(
            interpret_response(403, body).unwrap(),
            Delivery::Rejected {
                reason: "Forbidden: bot was blocked by the user".to_string()
            }
        );
    }

    #[test]
    fn test_interpret_failures() {
        assert!(matches!(interpret_response(401, "{}"), Err(Error::Delivery(_))));
        assert!(matches!(
            interpret_response(429, r#"{"ok":false,"description":"Too Many Requests: retry after 5"}"#),
            Err(Error::Delivery(ref msg)) if msg.contains("retry after 5")
        ));
        assert!(matches!(interpret_response(502, "<html>"), Err(Error::Delivery(ref msg)) if msg.contains("502")));
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        let sink = TelegramSink::with_api_base("123:super-secret", None, "http://127.0.0.1:9").unwrap();
        let err = sink.deliver(UserId(1), "hello").await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
        assert!(!err.to_string().contains("super-secret"));
    }
}
