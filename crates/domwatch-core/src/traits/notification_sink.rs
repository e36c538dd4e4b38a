// # Notification Sink Trait
//
// Defines the interface for delivering a text message to a user.
//
// ## Implementations
//
// - Telegram Bot API: `domwatch-sink-telegram` crate
// - Log-only sink: `domwatch_core::sinks::LogSink`
//
// ## Usage
//
// ```rust,ignore
// use domwatch_core::{NotificationSink, UserId};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let sink = /* NotificationSink implementation */;
//
//     let outcome = sink.deliver(UserId(42), "example.com is now blocked").await?;
//     println!("{outcome:?}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use super::store::UserId;

/// Outcome of a delivery attempt the transport answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The transport accepted the message
    Accepted,
    /// The transport refused the message (e.g. the user blocked the bot)
    Rejected {
        /// Transport-provided reason
        reason: String,
    },
}

impl Delivery {
    /// Whether the message was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Trait for notification sink implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform network calls to its transport only
/// - ✅ Report accepted/rejected
///
/// ## Forbidden Capabilities
/// - ❌ Retry deliveries (delivery is at-most-once, owned by the `Notifier`)
/// - ❌ Split or rewrite message text (the `Notifier` truncates to
///   [`NotificationSink::max_message_len`] before calling)
/// - ❌ Access the stores
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `user_id`
    ///
    /// # Returns
    ///
    /// - `Ok(Delivery::Accepted)`: The transport accepted the message
    /// - `Ok(Delivery::Rejected { .. })`: The transport refused it
    /// - `Err(Error)`: Transport failure (network, server error)
    async fn deliver(&self, user_id: UserId, text: &str) -> Result<Delivery, crate::Error>;

    /// Maximum message length (in characters) the transport accepts
    fn max_message_len(&self) -> Option<usize> {
        None
    }

    /// Get the sink name (for logging/debugging)
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing notification sinks from configuration
pub trait NotificationSinkFactory: Send + Sync {
    /// Create a NotificationSink instance from configuration
    fn create(
        &self,
        config: &crate::config::SinkConfig,
    ) -> Result<Box<dyn NotificationSink>, crate::Error>;
}
