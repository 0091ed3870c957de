//! Integration backends for publishing collection dates
//!
//! Acquired dates fan out to two kinds of backend: calendars receive an
//! all-day event unless one already exists, notifiers receive the date as
//! a message in their own wire format. Backends are independent; one
//! failing never blocks another.

pub mod google;
pub mod mqtt;
pub mod outlook;
pub mod registry;
pub mod webhook;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::CollectionAttributes;

// Re-exports
pub use google::GoogleCalendar;
pub use mqtt::MqttNotifier;
pub use outlook::OutlookCalendar;
pub use registry::IntegrationRegistry;
pub use webhook::WebhookNotifier;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur during backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid backend configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Authentication or token refresh failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token or credential file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MQTT broker interaction failed
    #[error("MQTT error: {0}")]
    Mqtt(String),

    /// Remote service answered outside the accepted status range
    #[error("{operation} returned HTTP {status}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    /// Generic error
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Transport failures may clear on the next scheduled run; config and
    /// auth failures will not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Mqtt(_))
    }
}

// ============================================================================
// Delivery Status
// ============================================================================

/// Outcome of one backend delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Backend that handled (or failed to handle) the delivery
    pub backend: String,
    /// Whether the delivery succeeded
    pub success: bool,
    /// Optional detail about the outcome
    pub detail: Option<String>,
    /// Timestamp of the attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    pub fn success(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            success: true,
            detail: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn success_with_detail(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            success: true,
            detail: Some(detail.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn failure(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            success: false,
            detail: Some(detail.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.backend)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Backend Traits
// ============================================================================

/// A calendar visible to a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSummary {
    pub id: String,
    pub name: String,
}

/// Trait for calendar backends
///
/// Event creation is idempotent per backend: [`Calendar::create_event`]
/// checks for an existing event with the same title in the date window
/// before creating one.
#[async_trait]
pub trait Calendar: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Check whether an event with this title exists in the window
    async fn event_exists(
        &self,
        title: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BackendResult<bool>;

    /// Create an all-day event unless one already exists
    ///
    /// Returns `Ok(true)` when an event was created, `Ok(false)` when a
    /// duplicate was found and nothing was written.
    async fn create_event(
        &self,
        title: &str,
        start: NaiveDate,
        end: NaiveDate,
        location: &str,
        reminder_minutes: u32,
    ) -> BackendResult<bool>;

    /// List calendars visible to the authenticated account
    async fn list_calendars(&self) -> BackendResult<Vec<CalendarSummary>>;
}

/// Trait for notification backends
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Publish the collection attributes in the backend's wire format
    ///
    /// Returns `Ok(true)` on confirmed delivery.
    async fn notify(&self, attributes: &CollectionAttributes) -> BackendResult<bool>;
}

// ============================================================================
// URL helpers
// ============================================================================

/// Append path segments to a base URL, percent-encoding each segment
///
/// Calendar identifiers routinely contain characters that are not URL-safe,
/// so they must never be spliced into a path with `format!`.
pub(crate) fn join_segments(base: &str, segments: &[&str]) -> BackendResult<String> {
    let mut url = url::Url::parse(base)
        .map_err(|e| BackendError::InvalidConfig(format!("invalid base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::InvalidConfig(format!("URL cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_success() {
        let status = DeliveryStatus::success("outlook");
        assert!(status.success);
        assert_eq!(status.backend, "outlook");
        assert!(status.detail.is_none());
    }

    #[test]
    fn test_delivery_status_failure_display() {
        let status = DeliveryStatus::failure("mqtt", "connection refused");
        assert!(!status.success);
        let rendered = status.to_string();
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("mqtt"));
        assert!(rendered.contains("connection refused"));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(BackendError::Mqtt("broker down".to_string()).is_recoverable());
        assert!(!BackendError::InvalidConfig("missing client_id".to_string()).is_recoverable());
        assert!(!BackendError::Auth("refresh rejected".to_string()).is_recoverable());
        assert!(!BackendError::UnexpectedStatus {
            operation: "event create",
            status: 500
        }
        .is_recoverable());
    }

    #[test]
    fn test_join_segments_encodes() {
        let url = join_segments(
            "https://graph.microsoft.com/v1.0/me/calendars",
            &["AAMkAD = special/chars", "events"],
        )
        .unwrap();
        assert!(url.starts_with("https://graph.microsoft.com/v1.0/me/calendars/"));
        assert!(url.ends_with("/events"));
        assert!(!url.contains(" = "));
        assert!(!url.contains("special/chars"));
    }

    #[test]
    fn test_join_segments_trailing_slash() {
        let url = join_segments("https://example.com/v1/", &["me", "events"]).unwrap();
        assert_eq!(url, "https://example.com/v1/me/events");
    }
}
