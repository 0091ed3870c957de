//! Shared WebDriver stub built on wiremock
//!
//! Stands in for a chromedriver endpoint: session lifecycle, navigation and
//! element interaction answer like the real protocol, and element lookups
//! resolve against whatever the individual test mounts.

// Not every test binary uses every helper.
#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use binday::scraper::elements;
use binday::session::protocol::find_element_payload;

/// Session id the stub hands out
pub const SESSION_ID: &str = "wd-test";

fn ok_value(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": value }))
}

fn element_ref(element_id: &str) -> Value {
    json!({ "element-6066-11e4-a52e-4f735466cecf": element_id })
}

/// The 404 body a real endpoint produces for a failed element lookup
pub fn missing_element_response() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "value": {
            "error": "no such element",
            "message": "Unable to locate element",
            "stacktrace": ""
        }
    }))
}

pub struct WebDriverStub {
    pub server: MockServer,
}

impl WebDriverStub {
    /// Start a stub accepting session open, teardown, navigation and every
    /// click and send-keys interaction
    ///
    /// Lookups for selectors no test mounted answer "no such element", so an
    /// absent panel behaves exactly like a page that never rendered it.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ok_value(
                json!({ "sessionId": SESSION_ID, "capabilities": {} }),
            ))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(format!("/session/{SESSION_ID}")))
            .respond_with(ok_value(json!(null)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/session/{SESSION_ID}/url")))
            .respond_with(ok_value(json!(null)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(format!(
                "^/session/{SESSION_ID}/element/[^/]+/click$"
            )))
            .respond_with(ok_value(json!(null)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(format!(
                "^/session/{SESSION_ID}/element/[^/]+/value$"
            )))
            .respond_with(ok_value(json!(null)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/session/{SESSION_ID}/element")))
            .respond_with(missing_element_response())
            .with_priority(250)
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn endpoint(&self) -> String {
        self.server.uri()
    }

    /// Make a selector resolve to the given element id
    pub async fn element(&self, selector: &str, element_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/session/{SESSION_ID}/element")))
            .and(body_json(find_element_payload(selector)))
            .respond_with(ok_value(element_ref(element_id)))
            .mount(&self.server)
            .await;
    }

    /// Make a descendant lookup under `parent_id` return the given children
    pub async fn children(&self, parent_id: &str, selector: &str, child_ids: &[&str]) {
        let refs: Vec<Value> = child_ids.iter().map(|id| element_ref(id)).collect();
        Mock::given(method("POST"))
            .and(path(format!(
                "/session/{SESSION_ID}/element/{parent_id}/elements"
            )))
            .and(body_json(find_element_payload(selector)))
            .respond_with(ok_value(json!(refs)))
            .mount(&self.server)
            .await;
    }

    /// Fix the visible text of an element
    pub async fn text(&self, element_id: &str, text: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/session/{SESSION_ID}/element/{element_id}/text"
            )))
            .respond_with(ok_value(json!(text)))
            .mount(&self.server)
            .await;
    }

    /// Fix an attribute value of an element
    pub async fn attribute(&self, element_id: &str, name: &str, value: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/session/{SESSION_ID}/element/{element_id}/attribute/{name}"
            )))
            .respond_with(ok_value(json!(value)))
            .mount(&self.server)
            .await;
    }
}

/// Mount the full lookup form with the given `(value, text)` address options
pub async fn mount_lookup_form(stub: &WebDriverStub, options: &[(&str, &str)]) {
    stub.element(elements::SEARCH_BY_POSTCODE, "el-mode").await;
    stub.element(elements::POSTCODE_TEXTBOX, "el-postcode").await;
    stub.element(elements::ADDRESS_LOOKUP_BUTTON, "el-lookup").await;
    stub.element(elements::ADDRESS_LIST, "el-list").await;
    stub.element(elements::SELECT_ADDRESS_BUTTON, "el-submit").await;

    let ids: Vec<String> = (0..options.len()).map(|i| format!("opt-{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    stub.children("el-list", "option", &id_refs).await;

    for (id, (value, text)) in ids.iter().zip(options) {
        stub.text(id, text).await;
        stub.attribute(id, "value", value).await;
    }
}

/// Mount a schedule grid whose schedule row carries `row_text`
pub async fn mount_grid_result(stub: &WebDriverStub, row_text: &str) {
    stub.element(elements::ITEMS_GRID, "el-grid").await;
    stub.children("el-grid", "tr", &["row-header", "row-schedule"])
        .await;
    stub.text("row-header", "Collection Schedule").await;
    stub.text("row-schedule", row_text).await;
}

/// Mount the diagnostic details panel instead of a grid
pub async fn mount_details_result(stub: &WebDriverStub, message: &str) {
    stub.element(elements::DETAILS_PANEL, "el-details").await;
    stub.text("el-details", message).await;
}

/// Scraper tunables pointing at the stub, with waits short enough for tests
pub fn test_scraper_config(stub: &WebDriverStub) -> binday::scraper::ScraperConfig {
    binday::scraper::ScraperConfig {
        lookup_url: format!("{}/lookup", stub.endpoint()),
        element_wait: std::time::Duration::from_millis(500),
        result_wait: std::time::Duration::from_millis(500),
        poll_interval: std::time::Duration::from_millis(25),
    }
}
