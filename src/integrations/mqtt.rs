//! MQTT notification backend
//!
//! Publishes the collection date as three retained messages under a shared
//! topic prefix: a Home Assistant discovery config, a state value and a
//! JSON attributes document. Retained delivery means subscribers that
//! connect between runs still see the latest date.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use tracing::{debug, info};
use uuid::Uuid;

use super::{BackendError, BackendResult, Notifier};
use crate::config::MqttConfig;
use crate::models::CollectionAttributes;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Render a date through a user-supplied chrono pattern
///
/// A bad specifier in the pattern only surfaces as an error through the
/// fallible `write!` path; `to_string` on the `DelayedFormat` panics.
fn render_date(date: NaiveDate, format: &str) -> BackendResult<String> {
    use std::fmt::Write;

    let mut rendered = String::new();
    write!(rendered, "{}", date.format(format)).map_err(|_| {
        BackendError::InvalidConfig(format!(
            "state_format '{format}' is not a valid date pattern"
        ))
    })?;
    Ok(rendered)
}

/// MQTT notification backend
pub struct MqttNotifier {
    broker: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    topic: String,
    state_format: Option<String>,
    timeout: Duration,
}

impl MqttNotifier {
    /// Create a backend for the given broker
    pub fn new(broker: impl Into<String>, port: u16) -> BackendResult<Self> {
        let broker = broker.into();
        if broker.trim().is_empty() {
            return Err(BackendError::InvalidConfig(
                "MQTT broker cannot be empty".to_string(),
            ));
        }
        if port == 0 {
            return Err(BackendError::InvalidConfig(
                "MQTT port cannot be 0".to_string(),
            ));
        }

        Ok(Self {
            broker: broker.trim().to_string(),
            port,
            username: None,
            password: None,
            topic: MqttConfig::DEFAULT_TOPIC.to_string(),
            state_format: None,
            timeout: PUBLISH_TIMEOUT,
        })
    }

    /// Build a backend from the MQTT configuration section
    pub fn from_config(config: &MqttConfig) -> BackendResult<Self> {
        let broker = config.broker().ok_or_else(|| {
            BackendError::InvalidConfig("MQTT enabled but no broker configured".to_string())
        })?;

        let mut notifier = Self::new(broker, config.port())?;
        if let Some(username) = config.username() {
            notifier = notifier.with_credentials(username, config.password());
        }
        notifier = notifier.with_topic(config.topic());
        if let Some(format) = config.state_format() {
            // Pattern validity does not depend on the date, so a single
            // sample render rejects a broken pattern at construction time
            render_date(NaiveDate::default(), &format)?;
            notifier = notifier.with_state_format(format);
        }
        Ok(notifier)
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Override the state payload with a chrono format pattern
    pub fn with_state_format(mut self, format: impl Into<String>) -> Self {
        self.state_format = Some(format.into());
        self
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Home Assistant MQTT discovery document
    fn discovery_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "name": "Bin Collection",
            "state_topic": format!("{}/state", self.topic),
            "json_attributes_topic": format!("{}/attributes", self.topic),
            "unique_id": "binday_belfast",
            "device": {
                "identifiers": ["binday"],
                "name": "Belfast Bin Collection",
                "manufacturer": "Custom",
                "model": "binday",
            },
        })
    }

    fn state_payload(&self, attributes: &CollectionAttributes) -> BackendResult<String> {
        match &self.state_format {
            Some(format) => render_date(attributes.date, format),
            None => Ok(attributes.date_string()),
        }
    }

    fn attributes_payload(&self, attributes: &CollectionAttributes) -> serde_json::Value {
        serde_json::json!({
            "title": attributes.title,
            "date": attributes.date_string(),
            "day_of_week": attributes.day_of_week,
            "days_until": attributes.days_until,
            "last_update": attributes.last_update.to_rfc3339(),
        })
    }

    /// Publish all three retained messages, then drive the event loop until
    /// the disconnect goes out
    async fn publish_all(&self, attributes: &CollectionAttributes) -> BackendResult<()> {
        // Rendered before the client exists so a bad payload never opens
        // a connection
        let state = self.state_payload(attributes)?;

        let client_id = format!("binday-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &self.broker, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let publishes = [
            (format!("{}/config", self.topic), self.discovery_payload().to_string()),
            (format!("{}/state", self.topic), state),
            (
                format!("{}/attributes", self.topic),
                self.attributes_payload(attributes).to_string(),
            ),
        ];
        for (topic, payload) in publishes {
            client
                .publish(topic, QoS::AtLeastOnce, true, payload)
                .await
                .map_err(|e| BackendError::Mqtt(e.to_string()))?;
        }
        client
            .disconnect()
            .await
            .map_err(|e| BackendError::Mqtt(e.to_string()))?;

        // The queued publishes only hit the wire while the event loop turns
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(event) => debug!(?event, "mqtt event"),
                Err(e) => return Err(BackendError::Mqtt(e.to_string())),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MqttNotifier {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn notify(&self, attributes: &CollectionAttributes) -> BackendResult<bool> {
        tokio::time::timeout(self.timeout, self.publish_all(attributes))
            .await
            .map_err(|_| {
                BackendError::Mqtt(format!(
                    "publish to {}:{} timed out after {}s",
                    self.broker,
                    self.port,
                    self.timeout.as_secs()
                ))
            })??;

        info!(broker = %self.broker, topic = %self.topic, "mqtt state published");
        Ok(true)
    }
}
