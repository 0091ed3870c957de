//! Outlook calendar backend (Microsoft Graph)
//!
//! Authenticates with a locally persisted OAuth token acquired out of band
//! and refreshed in place when it nears expiry. Events land in the account
//! default calendar unless a calendar id or name is configured; names are
//! resolved to ids once per process and the outcome is cached either way.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{join_segments, BackendError, BackendResult, Calendar, CalendarSummary};
use crate::config::OutlookConfig;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const TOKEN_SCOPE: &str = "https://graph.microsoft.com/Calendars.ReadWrite \
                           https://graph.microsoft.com/User.Read offline_access";

/// Seconds before nominal expiry at which the token is refreshed
const REFRESH_MARGIN_SECS: f64 = 300.0;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Token Store
// ============================================================================

/// Persisted OAuth token file
///
/// Unknown keys round-trip through `extra` so a file written by another
/// tool survives a refresh untouched apart from the rotated fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStore {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (fractional seconds) at which the access token expires
    pub expires_at: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl TokenStore {
    /// True when the token should be refreshed before use
    pub fn needs_refresh(&self, now: f64) -> bool {
        now >= self.expires_at - REFRESH_MARGIN_SECS
    }

    pub async fn load(path: &Path) -> BackendResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save(&self, path: &Path) -> BackendResult<()> {
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }

    /// Fold a refresh response into the store
    ///
    /// Some token endpoints omit the refresh token when it has not rotated;
    /// the stored one stays valid in that case.
    fn apply(&mut self, response: RefreshResponse, now: f64) {
        self.access_token = response.access_token;
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = refresh_token;
        }
        let expires_in = response.expires_in.unwrap_or(3600);
        self.expires_at = now + expires_in as f64;
        self.extra
            .insert("expires_in".to_string(), expires_in.into());
    }
}

// ============================================================================
// Outlook Calendar
// ============================================================================

/// Cached resolution of the Graph events collection URL
enum EventsTarget {
    Unresolved,
    /// Name lookup failed; cached so it is not retried within the run
    Disabled,
    Resolved(String),
}

/// Outlook calendar backend
pub struct OutlookCalendar {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    tenant: String,
    token_path: PathBuf,
    token: Mutex<TokenStore>,
    calendar_id: Option<String>,
    calendar_name: Option<String>,
    events_target: Mutex<EventsTarget>,
    graph_base: String,
    login_base: String,
}

impl OutlookCalendar {
    /// Build a backend from the Outlook configuration section
    ///
    /// Fails when no client id is configured or the token file cannot be
    /// read; there is no interactive flow to mint a first token here.
    pub async fn from_config(config: &OutlookConfig, data_dir: &Path) -> BackendResult<Self> {
        let client_id = config.client_id().ok_or_else(|| {
            BackendError::InvalidConfig("Outlook enabled but no client_id configured".to_string())
        })?;
        let token_path = config.token_file_path(data_dir);
        let token = TokenStore::load(&token_path).await?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            client,
            client_id,
            client_secret: config.client_secret(),
            tenant: config.tenant(),
            token_path,
            token: Mutex::new(token),
            calendar_id: config.calendar_id(),
            calendar_name: config.calendar_name(),
            events_target: Mutex::new(EventsTarget::Unresolved),
            graph_base: GRAPH_BASE.to_string(),
            login_base: LOGIN_BASE.to_string(),
        })
    }

    /// Point the backend at alternative Graph and login endpoints
    pub fn with_base_urls(
        mut self,
        graph_base: impl Into<String>,
        login_base: impl Into<String>,
    ) -> Self {
        self.graph_base = graph_base.into().trim_end_matches('/').to_string();
        self.login_base = login_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Current access token, refreshing and persisting it first if needed
    async fn bearer(&self) -> BackendResult<String> {
        let mut token = self.token.lock().await;
        let now = Utc::now().timestamp() as f64;
        if token.needs_refresh(now) {
            debug!("access token stale, refreshing");
            let url = format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant);
            let mut form: Vec<(&str, String)> = vec![
                ("client_id", self.client_id.clone()),
                ("scope", TOKEN_SCOPE.to_string()),
                ("refresh_token", token.refresh_token.clone()),
                ("grant_type", "refresh_token".to_string()),
            ];
            if let Some(secret) = &self.client_secret {
                form.push(("client_secret", secret.clone()));
            }

            let response = self.client.post(&url).form(&form).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Auth(format!(
                    "token refresh returned HTTP {status}: {body}"
                )));
            }
            let refresh: RefreshResponse = response.json().await?;
            token.apply(refresh, now);
            if let Err(e) = token.save(&self.token_path).await {
                warn!(
                    path = %self.token_path.display(),
                    error = %e,
                    "refreshed token not persisted, next run will refresh again"
                );
            }
        }
        Ok(token.access_token.clone())
    }

    /// URL of the events collection, or `None` when a configured calendar
    /// name could not be resolved
    async fn events_url(&self) -> BackendResult<Option<String>> {
        let mut target = self.events_target.lock().await;
        match &*target {
            EventsTarget::Resolved(url) => return Ok(Some(url.clone())),
            EventsTarget::Disabled => return Ok(None),
            EventsTarget::Unresolved => {}
        }

        let resolved = if let Some(id) = &self.calendar_id {
            Some(join_segments(&self.graph_base, &["me", "calendars", id, "events"])?)
        } else if let Some(name) = &self.calendar_name {
            match self.find_calendar_id(name).await {
                Some(id) => {
                    Some(join_segments(&self.graph_base, &["me", "calendars", &id, "events"])?)
                }
                None => None,
            }
        } else {
            Some(join_segments(&self.graph_base, &["me", "events"])?)
        };

        *target = match &resolved {
            Some(url) => EventsTarget::Resolved(url.clone()),
            None => EventsTarget::Disabled,
        };
        Ok(resolved)
    }

    /// Events collection URL, failing when the calendar is unresolvable
    async fn require_events_url(&self) -> BackendResult<String> {
        match self.events_url().await? {
            Some(url) => Ok(url),
            None => Err(BackendError::InvalidConfig(format!(
                "calendar '{}' could not be resolved",
                self.calendar_name.as_deref().unwrap_or_default()
            ))),
        }
    }

    /// Resolve a calendar name to an id by listing the account's calendars
    ///
    /// Matching is trimmed and case-insensitive. Any failure here answers
    /// `None`; the caller caches that outcome rather than retrying.
    async fn find_calendar_id(&self, name: &str) -> Option<String> {
        let calendars = match self.list_calendars().await {
            Ok(calendars) => calendars,
            Err(e) => {
                warn!(calendar = %name, error = %e, "calendar lookup failed, events disabled");
                return None;
            }
        };

        let wanted = name.trim();
        let matches: Vec<&CalendarSummary> = calendars
            .iter()
            .filter(|c| c.name.trim().eq_ignore_ascii_case(wanted))
            .collect();
        match matches.as_slice() {
            [] => {
                warn!(calendar = %name, "no calendar with this name, events disabled");
                None
            }
            [only] => Some(only.id.clone()),
            [first, ..] => {
                warn!(
                    calendar = %name,
                    count = matches.len(),
                    "multiple calendars share this name, using the first"
                );
                Some(first.id.clone())
            }
        }
    }
}

#[async_trait]
impl Calendar for OutlookCalendar {
    fn name(&self) -> &str {
        "outlook"
    }

    async fn event_exists(
        &self,
        title: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BackendResult<bool> {
        let url = self.require_events_url().await?;
        let bearer = self.bearer().await?;

        let filter = format!(
            "start/dateTime ge '{}' and end/dateTime le '{}'",
            start.format("%Y-%m-%dT00:00:00"),
            end.format("%Y-%m-%dT00:00:00"),
        );
        let response = self
            .client
            .get(&url)
            .query(&[("$filter", filter.as_str())])
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
        let exists = body["value"]
            .as_array()
            .is_some_and(|events| events.iter().any(|e| e["subject"] == title));
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
        let url = self.require_events_url().await?;
        let bearer = self.bearer().await?;

        let payload = serde_json::json!({
            "subject": title,
            "location": {"displayName": location},
            "start": {
                "dateTime": start.format("%Y-%m-%dT00:00:00").to_string(),
                "timeZone": "UTC",
            },
            "end": {
                "dateTime": end.format("%Y-%m-%dT00:00:00").to_string(),
                "timeZone": "UTC",
            },
            "isAllDay": true,
            "reminderMinutesBeforeStart": reminder_minutes,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&bearer)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::CREATED {
            info!(%title, date = %start, "outlook event created");
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
        let url = join_segments(&self.graph_base, &["me", "calendars"])?;
        let response = self.client.get(&url).bearer_auth(&bearer).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus {
                operation: "calendar list",
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let calendars = body["value"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let id = entry["id"].as_str()?.trim();
                        let name = entry["name"].as_str()?.trim();
                        (!id.is_empty() && !name.is_empty()).then(|| CalendarSummary {
                            id: id.to_string(),
                            name: name.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(calendars)
    }
}
