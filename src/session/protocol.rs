//! Wire types for the W3C remote protocol
//!
//! Only the verbs the lookup flow needs are modeled: session lifecycle,
//! navigation, element lookup, click, send-keys, text and attribute reads.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// JSON key carrying an element reference in protocol responses
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Locator strategy for every lookup this client performs
pub const CSS_SELECTOR: &str = "css selector";

/// Envelope wrapping every protocol response body
#[derive(Debug, Deserialize)]
pub struct WireResponse<T> {
    pub value: T,
}

/// Successful new-session payload
#[derive(Debug, Deserialize)]
pub struct NewSessionValue {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Element reference payload
#[derive(Debug, Deserialize)]
pub struct ElementValue {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub element_id: String,
}

/// Error payload returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Protocol error code for a failed element lookup
pub const NO_SUCH_ELEMENT: &str = "no such element";

/// Capabilities for a headless browser session
///
/// The argument set mirrors what the lookup site tolerates from an
/// unattended container.
pub fn new_session_payload() -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": [
                        "--headless=new",
                        "--no-sandbox",
                        "--disable-gpu",
                        "--disable-dev-shm-usage",
                        "--disable-extensions",
                        "--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                    ]
                }
            }
        }
    })
}

/// Body for an element lookup by CSS selector
pub fn find_element_payload(selector: &str) -> Value {
    json!({ "using": CSS_SELECTOR, "value": selector })
}

/// Body for a navigation request
pub fn navigate_payload(url: &str) -> Value {
    json!({ "url": url })
}

/// Body for a send-keys request
pub fn send_keys_payload(text: &str) -> Value {
    json!({ "text": text })
}

/// Parse an error body; tolerates bodies that are not valid envelopes
pub fn parse_error_body(body: &str) -> WireError {
    serde_json::from_str::<WireResponse<WireError>>(body)
        .map(|r| r.value)
        .unwrap_or_else(|_| WireError {
            error: String::new(),
            message: body.chars().take(200).collect(),
        })
}

/// Decode the `value` field of a successful response body
pub fn decode_value<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str::<WireResponse<T>>(body).map(|r| r.value)
}
