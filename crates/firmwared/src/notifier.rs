// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Terminal lifecycle notifications
//!
//! Operation outcomes outlive the request that triggered them (the device
//! reboots in between), so they are reported out-of-band: logged, and
//! optionally POSTed to a configured endpoint. Delivery is fire-and-forget;
//! a dead endpoint must never block startup.

use crate::config::AgentConfig;
use crate::error::{FirmwareError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    UpgradeSuccess,
    UpgradeFail,
    ResetSuccess,
    ResetFail,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: EventKind,
    pub version: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(event: EventKind, version: &str) -> Self {
        Self {
            event,
            version: version.to_string(),
            at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, notification: &Notification) -> Result<()>;
}

/// Default sink: serialize the event and log it.
#[derive(Debug)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn emit(&self, notification: &Notification) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        tracing::info!("Lifecycle event: {json}");
        Ok(())
    }
}

/// POSTs events as JSON to the configured endpoint. Errors are logged and
/// swallowed.
#[derive(Debug)]
pub struct HttpSink {
    url: String,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .map_err(|e| FirmwareError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl EventSink for HttpSink {
    async fn emit(&self, notification: &Notification) -> Result<()> {
        match self.client.post(&self.url).json(notification).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Notification delivered to {}", self.url);
            }
            Ok(response) => {
                tracing::warn!(
                    "Notification endpoint {} returned status {}",
                    self.url,
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!("Failed to deliver notification to {}: {e}", self.url);
            }
        }
        Ok(())
    }
}

/// Pick the sink for this configuration.
pub fn make_sink(config: &AgentConfig) -> Result<Arc<dyn EventSink>> {
    match &config.notify_url {
        Some(url) => Ok(Arc::new(HttpSink::new(url.clone())?)),
        None => Ok(Arc::new(LogSink)),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Records emitted events for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        pub fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().unwrap().iter().map(|n| n.event).collect()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn emit(&self, notification: &Notification) -> Result<()> {
            self.events.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::new(EventKind::UpgradeFail, "1.0.0");
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("UPGRADE_FAIL"));
        assert!(json.contains("1.0.0"));
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(
            serde_json::to_value(EventKind::ResetSuccess).unwrap(),
            "RESET_SUCCESS"
        );
        assert_eq!(
            serde_json::to_value(EventKind::UpgradeSuccess).unwrap(),
            "UPGRADE_SUCCESS"
        );
    }

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        let sink = LogSink;
        let result = sink.emit(&Notification::new(EventKind::ResetFail, "")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_http_sink_posts_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let sink = HttpSink::new(format!("{}/events", server.url())).unwrap();
        sink.emit(&Notification::new(EventKind::UpgradeSuccess, "2.0.0"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_sink_swallows_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .with_status(500)
            .create_async()
            .await;

        let sink = HttpSink::new(format!("{}/events", server.url())).unwrap();
        let result = sink
            .emit(&Notification::new(EventKind::UpgradeFail, "2.0.0"))
            .await;
        assert!(result.is_ok());

        mock.assert_async().await;
    }
}
