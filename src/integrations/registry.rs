//! Backend registry construction
//!
//! Assembles the set of enabled backends from configuration. Construction
//! is isolating: a backend that cannot be built is logged and left out,
//! and never stops the others from starting.

use tracing::{info, warn};

use super::{Calendar, GoogleCalendar, MqttNotifier, Notifier, OutlookCalendar, WebhookNotifier};
use crate::config::Config;
use crate::status::{StatusHandle, StatusServer};

/// The set of live backends for one process
#[derive(Default)]
pub struct IntegrationRegistry {
    calendars: Vec<Box<dyn Calendar>>,
    notifiers: Vec<Box<dyn Notifier>>,
    status: Option<StatusHandle>,
}

impl IntegrationRegistry {
    /// Build every enabled backend
    ///
    /// Never fails; misconfigured backends are excluded with a warning so
    /// the remaining integrations still receive the date.
    pub async fn build(config: &Config) -> Self {
        let mut registry = Self::default();
        let data_dir = config.data_dir();

        if config.calendars.outlook.is_enabled() {
            match OutlookCalendar::from_config(&config.calendars.outlook, &data_dir).await {
                Ok(calendar) => registry.calendars.push(Box::new(calendar)),
                Err(e) => warn!(backend = "outlook", error = %e, "backend excluded"),
            }
        }

        if config.calendars.google.is_enabled() {
            match GoogleCalendar::from_config(&config.calendars.google, &data_dir) {
                Ok(calendar) => registry.calendars.push(Box::new(calendar)),
                Err(e) => warn!(backend = "google", error = %e, "backend excluded"),
            }
        }

        if config.webhook.is_enabled() {
            match config.webhook.url() {
                Some(url) => match WebhookNotifier::new(url) {
                    Ok(notifier) => registry.notifiers.push(Box::new(notifier)),
                    Err(e) => warn!(backend = "webhook", error = %e, "backend excluded"),
                },
                None => warn!(
                    backend = "webhook",
                    "webhook enabled but no URL configured, backend excluded"
                ),
            }
        }

        if config.mqtt.is_enabled() {
            match MqttNotifier::from_config(&config.mqtt) {
                Ok(notifier) => registry.notifiers.push(Box::new(notifier)),
                Err(e) => warn!(backend = "mqtt", error = %e, "backend excluded"),
            }
        }

        if config.status.is_enabled() {
            match StatusServer::bind(&config.status.host(), config.status.port()).await {
                Ok(server) => registry.status = Some(server.spawn()),
                Err(e) => warn!(backend = "status", error = %e, "backend excluded"),
            }
        }

        info!(
            calendars = registry.calendars.len(),
            notifiers = registry.notifiers.len(),
            status = registry.status.is_some(),
            "integration registry ready"
        );
        registry
    }

    /// Assemble a registry from already constructed backends
    pub fn from_parts(
        calendars: Vec<Box<dyn Calendar>>,
        notifiers: Vec<Box<dyn Notifier>>,
        status: Option<StatusHandle>,
    ) -> Self {
        Self {
            calendars,
            notifiers,
            status,
        }
    }

    pub fn calendars(&self) -> &[Box<dyn Calendar>] {
        &self.calendars
    }

    pub fn notifiers(&self) -> &[Box<dyn Notifier>] {
        &self.notifiers
    }

    pub fn status_handle(&self) -> Option<&StatusHandle> {
        self.status.as_ref()
    }

    /// Number of delivery backends, not counting the status API
    pub fn backend_count(&self) -> usize {
        self.calendars.len() + self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend_count() == 0 && self.status.is_none()
    }

    /// Backend names in delivery order
    pub fn backend_names(&self) -> Vec<String> {
        self.calendars
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.notifiers.iter().map(|n| n.name().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_builds_empty_registry() {
        // Outlook is on by default but has no client id, so it is excluded
        let config = Config::default();
        let registry = IntegrationRegistry::build(&config).await;

        assert_eq!(registry.backend_count(), 0);
        assert!(registry.is_empty());
        assert!(registry.status_handle().is_none());
        assert!(registry.backend_names().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_without_url_excluded() {
        let mut config = Config::default();
        config.calendars.outlook.enabled = Some(false);
        config.webhook.enabled = Some(true);
        let registry = IntegrationRegistry::build(&config).await;

        assert_eq!(registry.backend_count(), 0);
    }

    #[tokio::test]
    async fn test_webhook_with_url_included() {
        let mut config = Config::default();
        config.calendars.outlook.enabled = Some(false);
        config.webhook.enabled = Some(true);
        config.webhook.url = Some("https://example.com/hook".to_string());
        let registry = IntegrationRegistry::build(&config).await;

        assert_eq!(registry.backend_count(), 1);
        assert_eq!(registry.backend_names(), vec!["webhook"]);
    }
}
