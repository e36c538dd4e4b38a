// # Log Sink
//
// Writes notifications to the tracing log instead of a messaging service.
// Useful for dry runs and for deployments without a bot token.

use async_trait::async_trait;
use tracing::info;

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::traits::{Delivery, NotificationSink, NotificationSinkFactory, UserId};

/// Notification sink that only logs
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, user_id: UserId, text: &str) -> Result<Delivery> {
        info!(target: "domwatch::notification", user_id = user_id.0, "{}", text);
        Ok(Delivery::Accepted)
    }

    fn sink_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for [`LogSink`]
pub struct LogSinkFactory;

impl NotificationSinkFactory for LogSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn NotificationSink>> {
        match config {
            SinkConfig::Log => Ok(Box::new(LogSink::new())),
            other => Err(Error::config(format!(
                "Invalid config for log sink: {}",
                other.type_name()
            ))),
        }
    }
}
