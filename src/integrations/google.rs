//! Google Calendar backend
//!
//! Authenticates as a service account; the target calendar must be shared
//! with the service account's email address for writes to succeed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{join_segments, BackendError, BackendResult, Calendar, CalendarSummary};
use crate::config::GoogleConfig;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// All-day events carry a timezone so the date does not shift around
/// midnight for local subscribers
const EVENT_TIMEZONE: &str = "Europe/London";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Calendar backend
pub struct GoogleCalendar {
    client: Client,
    provider: Arc<dyn TokenProvider>,
    calendar_id: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct EventDate {
    date: String,
    #[serde(rename = "timeZone")]
    time_zone: &'static str,
}

impl From<NaiveDate> for EventDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            time_zone: EVENT_TIMEZONE,
        }
    }
}

/// RFC 3339 bounds for an event listing window
fn window(start: NaiveDate, end: NaiveDate) -> (String, String) {
    (
        format!("{}T00:00:00Z", start.format("%Y-%m-%d")),
        format!("{}T00:00:00Z", end.format("%Y-%m-%d")),
    )
}

fn event_payload(
    title: &str,
    start: NaiveDate,
    end: NaiveDate,
    location: &str,
    reminder_minutes: u32,
) -> serde_json::Value {
    serde_json::json!({
        "summary": title,
        "location": location,
        "start": EventDate::from(start),
        "end": EventDate::from(end),
        "reminders": {
            "useDefault": false,
            "overrides": [
                {"method": "popup", "minutes": reminder_minutes},
            ],
        },
    })
}

impl GoogleCalendar {
    /// Build a backend around an existing token provider
    pub fn new(
        provider: Arc<dyn TokenProvider>,
        calendar_id: impl Into<String>,
    ) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            client,
            provider,
            calendar_id: calendar_id.into(),
            api_base: API_BASE.to_string(),
        })
    }

    /// Build a backend from the Google configuration section
    pub fn from_config(config: &GoogleConfig, data_dir: &Path) -> BackendResult<Self> {
        let path = config.service_account_path(data_dir);
        if !path.exists() {
            return Err(BackendError::InvalidConfig(format!(
                "service account file not found: {}",
                path.display()
            )));
        }
        let account = CustomServiceAccount::from_file(&path)
            .map_err(|e| BackendError::Auth(format!("service account rejected: {e}")))?;

        Self::new(Arc::new(account), config.calendar_id())
    }

    /// Point the backend at an alternative API endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn bearer(&self) -> BackendResult<String> {
        let token = self
            .provider
            .token(&[CALENDAR_SCOPE])
            .await
            .map_err(|e| BackendError::Auth(format!("service account token: {e}")))?;
        Ok(token.as_str().to_string())
    }

    fn events_url(&self) -> BackendResult<String> {
        join_segments(&self.api_base, &["calendars", &self.calendar_id, "events"])
    }
}

#[async_trait]
impl Calendar for GoogleCalendar {
    fn name(&self) -> &str {
        "google"
    }

    async fn event_exists(
        &self,
        title: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BackendResult<bool> {
        let bearer = self.bearer().await?;
        let (time_min, time_max) = window(start, end);
        let response = self
            .client
            .get(self.events_url()?)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .bearer_auth(&bearer)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus {
                operation: "event query",
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let exists = body["items"]
            .as_array()
            .is_some_and(|items| items.iter().any(|item| item["summary"] == title));
        Ok(exists)
    }

    async fn create_event(
        &self,
        title: &str,
        start: NaiveDate,
        end: NaiveDate,
        location: &str,
        reminder_minutes: u32,
    ) -> BackendResult<bool> {
        if self.event_exists(title, start, end).await? {
            debug!(%title, date = %start, "event already present");
            return Ok(false);
        }
        let bearer = self.bearer().await?;

        let payload = event_payload(title, start, end, location, reminder_minutes);
        let response = self
            .client
            .post(self.events_url()?)
            .bearer_auth(&bearer)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            info!(%title, date = %start, calendar = %self.calendar_id, "google event created");
            Ok(true)
        } else {
            Err(BackendError::UnexpectedStatus {
                operation: "event create",
                status: status.as_u16(),
            })
        }
    }

    async fn list_calendars(&self) -> BackendResult<Vec<CalendarSummary>> {
        let bearer = self.bearer().await?;
        let url = join_segments(&self.api_base, &["users", "me", "calendarList"])?;
        let response = self.client.get(&url).bearer_auth(&bearer).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus {
                operation: "calendar list",
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let calendars = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(CalendarSummary {
                            id: item["id"].as_str()?.to_string(),
                            name: item["summary"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(calendars)
    }
}
