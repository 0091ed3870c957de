//! Remote browser session over the W3C wire protocol
//!
//! The lookup site renders its form with script, so the pipeline drives a
//! remote browser (chromedriver or a compatible endpoint) instead of fetching
//! raw HTML. [`RemoteSession`] owns exactly one remote session for the
//! lifetime of a run; connection establishment retries with the schedule in
//! [`backoff`], and teardown is best-effort on every path.

pub mod backoff;
pub mod protocol;

pub use backoff::BackoffPolicy;

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between element polls inside [`RemoteSession::wait_for`]
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors raised by the remote session client
#[derive(Debug, Error)]
pub enum SessionError {
    /// HTTP transport failure talking to the remote endpoint
    #[error("transport: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint answered with a protocol error
    #[error("remote protocol error '{error}': {message}")]
    Protocol { error: String, message: String },

    /// A required element is absent from the page
    #[error("no such element: {selector}")]
    NoSuchElement { selector: String },

    /// An element did not appear within the bounded wait
    #[error("element {selector} did not appear within {waited_ms}ms")]
    WaitTimeout { selector: String, waited_ms: u64 },

    /// Every connection attempt failed
    #[error("connection failed after {attempts} attempts: {message}")]
    ConnectExhausted { attempts: u32, message: String },

    /// A success response carried an undecodable body
    #[error("malformed response: {message}")]
    Decode { message: String },
}

impl SessionError {
    /// Transport faults may clear on a retry; protocol outcomes will not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Reference to one element inside the remote page
#[derive(Debug, Clone)]
pub struct Element {
    id: String,
}

impl Element {
    /// Opaque element id assigned by the remote endpoint
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// One exclusive remote browser session
#[derive(Debug)]
pub struct RemoteSession {
    client: Client,
    endpoint: String,
    session_id: String,
}

impl RemoteSession {
    /// Connect to a remote endpoint by host and port with the default policy
    pub async fn connect(host: &str, port: u16) -> Result<Self, SessionError> {
        Self::connect_endpoint(&format!("http://{host}:{port}"), &BackoffPolicy::default()).await
    }

    /// Connect to a full endpoint URL, retrying per the given policy
    ///
    /// Each attempt opens a fresh session; nothing is carried over from a
    /// failed attempt. Exhausting the policy is fatal for the run.
    pub async fn connect_endpoint(
        endpoint: &str,
        policy: &BackoffPolicy,
    ) -> Result<Self, SessionError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        let mut last_error: Option<SessionError> = None;
        for attempt in 0..policy.max_attempts {
            let delay = policy.delay_for(attempt);
            if !delay.is_zero() {
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "waiting before next connection attempt"
                );
                tokio::time::sleep(delay).await;
            }

            info!(
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                endpoint = %endpoint,
                "opening remote session"
            );
            match Self::open(&client, &endpoint).await {
                Ok(session) => {
                    info!(session_id = %session.session_id, "remote session established");
                    return Ok(session);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "connection attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(SessionError::ConnectExhausted {
            attempts: policy.max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    async fn open(client: &Client, endpoint: &str) -> Result<Self, SessionError> {
        let session: protocol::NewSessionValue = Self::send(
            client,
            Method::POST,
            format!("{endpoint}/session"),
            Some(&protocol::new_session_payload()),
        )
        .await?;

        Ok(Self {
            client: client.clone(),
            endpoint: endpoint.to_string(),
            session_id: session.session_id,
        })
    }

    /// Id assigned by the remote endpoint
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Load a URL in the remote browser
    pub async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        debug!(url, "navigating");
        let _: Value = self
            .post(
                format!("{}/url", self.base()),
                &protocol::navigate_payload(url),
            )
            .await?;
        Ok(())
    }

    /// Locate an element by CSS selector; absence is an error
    pub async fn find(&self, selector: &str) -> Result<Element, SessionError> {
        let result: Result<protocol::ElementValue, SessionError> = self
            .post(
                format!("{}/element", self.base()),
                &protocol::find_element_payload(selector),
            )
            .await;
        match result {
            Ok(value) => Ok(Element {
                id: value.element_id,
            }),
            Err(SessionError::Protocol { error, .. }) if error == protocol::NO_SUCH_ELEMENT => {
                Err(SessionError::NoSuchElement {
                    selector: selector.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Locate an element by CSS selector; absence is `None`
    pub async fn try_find(&self, selector: &str) -> Result<Option<Element>, SessionError> {
        match self.find(selector).await {
            Ok(element) => Ok(Some(element)),
            Err(SessionError::NoSuchElement { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll for an element until it appears or the timeout elapses
    pub async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, SessionError> {
        let started = Instant::now();
        loop {
            if let Some(element) = self.try_find(selector).await? {
                return Ok(element);
            }
            if started.elapsed() >= timeout {
                return Err(SessionError::WaitTimeout {
                    selector: selector.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
        }
    }

    /// Locate descendants of an element by CSS selector
    pub async fn find_all_within(
        &self,
        element: &Element,
        selector: &str,
    ) -> Result<Vec<Element>, SessionError> {
        let values: Vec<protocol::ElementValue> = self
            .post(
                format!("{}/element/{}/elements", self.base(), element.id),
                &protocol::find_element_payload(selector),
            )
            .await?;
        Ok(values
            .into_iter()
            .map(|v| Element { id: v.element_id })
            .collect())
    }

    /// Click an element
    pub async fn click(&self, element: &Element) -> Result<(), SessionError> {
        let _: Value = self
            .post(
                format!("{}/element/{}/click", self.base(), element.id),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    /// Type text into an element
    pub async fn send_keys(&self, element: &Element, text: &str) -> Result<(), SessionError> {
        let _: Value = self
            .post(
                format!("{}/element/{}/value", self.base(), element.id),
                &protocol::send_keys_payload(text),
            )
            .await?;
        Ok(())
    }

    /// Visible text of an element
    pub async fn text(&self, element: &Element) -> Result<String, SessionError> {
        self.get(format!("{}/element/{}/text", self.base(), element.id))
            .await
    }

    /// Attribute value of an element, `None` when unset
    pub async fn attribute(
        &self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.get(format!(
            "{}/element/{}/attribute/{name}",
            self.base(),
            element.id
        ))
        .await
    }

    /// Tear the session down; failures are logged and swallowed
    pub async fn close(self) {
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        match Self::send::<Value>(&self.client, Method::DELETE, url, None).await {
            Ok(_) => debug!(session_id = %self.session_id, "remote session closed"),
            Err(e) => debug!(session_id = %self.session_id, error = %e, "session teardown failed"),
        }
    }

    fn base(&self) -> String {
        format!("{}/session/{}", self.endpoint, self.session_id)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        body: &Value,
    ) -> Result<T, SessionError> {
        Self::send(&self.client, Method::POST, url, Some(body)).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, SessionError> {
        Self::send(&self.client, Method::GET, url, None).await
    }

    async fn send<T: serde::de::DeserializeOwned>(
        client: &Client,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> Result<T, SessionError> {
        let mut request = client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            protocol::decode_value(&text).map_err(|e| SessionError::Decode {
                message: e.to_string(),
            })
        } else {
            let wire = protocol::parse_error_body(&text);
            Err(SessionError::Protocol {
                error: wire.error,
                message: wire.message,
            })
        }
    }
}
