//! Notification hook. The engine emits events; delivery belongs to the
//! external notification system, so failures here are logged and dropped.

use async_trait::async_trait;

use crate::models::notification::NotificationEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent);
}

/// Default emitter: structured log line only. Useful in dev and tests,
/// and a reasonable fallback when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &NotificationEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(event = %payload, "notification event"),
            Err(err) => tracing::error!("Failed to serialize notification event: {}", err),
        }
    }
}

/// POSTs each event as JSON to the notification system's ingest endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) {
        let result = self
            .client
            .post(&self.endpoint)
            .json(event)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Notification event delivered to {}", self.endpoint);
            }
            Ok(response) => {
                tracing::warn!(
                    "Notification endpoint {} returned {}",
                    self.endpoint,
                    response.status()
                );
            }
            Err(err) => {
                tracing::warn!("Failed to reach notification endpoint: {}", err);
            }
        }
    }
}
