//! Webhook dispatcher
//!
//! POSTs each notification as JSON to a configured endpoint. The transport
//! offers no idempotence guarantee; duplicate suppression is the run
//! coordinator's job.

use async_trait::async_trait;
use tracing::debug;

use super::{DispatchError, Dispatcher, Notification};

pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        debug!(
            "posting notification for {} to {}",
            notification.recipient_id, self.url
        );

        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| DispatchError {
                reason: format!("request to {} failed", self.url),
                source: Some(Box::new(e)),
            })?;

        response.error_for_status().map_err(|e| {
            let status = e
                .status()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown status".to_string());
            DispatchError {
                reason: format!("webhook returned {status}"),
                source: Some(Box::new(e)),
            }
        })?;

        Ok(())
    }
}
