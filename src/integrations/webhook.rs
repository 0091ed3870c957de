//! Webhook notification backend
//!
//! Posts the collection date to a configured endpoint as a JSON payload.
//! Delivery is a single POST; the scheduled run cadence is the retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{BackendError, BackendResult, Notifier};
use crate::models::CollectionAttributes;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook notification backend
///
/// # Payload Format
///
/// ```json
/// {
///   "event": "bin_collection",
///   "title": "Bin collection",
///   "date": "2025-03-15",
///   "day_of_week": "Saturday",
///   "days_until": 5,
///   "timestamp": "2025-03-10T19:30:00+00:00"
/// }
/// ```
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a webhook backend for the given endpoint URL
    pub fn new(url: impl Into<String>) -> BackendResult<Self> {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(BackendError::InvalidConfig(
                "webhook URL cannot be empty".to_string(),
            ));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(BackendError::InvalidConfig(format!(
                "webhook URL must start with http:// or https://: {trimmed}"
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            client,
            url: trimmed.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_payload(&self, attributes: &CollectionAttributes) -> serde_json::Value {
        serde_json::json!({
            "event": "bin_collection",
            "title": attributes.title,
            "date": attributes.date_string(),
            "day_of_week": attributes.day_of_week,
            "days_until": attributes.days_until,
            "timestamp": attributes.last_update.to_rfc3339(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, attributes: &CollectionAttributes) -> BackendResult<bool> {
        let payload = self.build_payload(attributes);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            info!(url = %self.url, %status, "webhook delivered");
            Ok(true)
        } else {
            Err(BackendError::UnexpectedStatus {
                operation: "webhook post",
                status: status.as_u16(),
            })
        }
    }
}
