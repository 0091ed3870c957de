//! Full pipeline test: stubbed lookup site through to delivered backends
//!
//! Exercises the same path a scheduled run takes: load the config, scrape
//! the date over the stubbed WebDriver endpoint, build the registry, fan
//! out, and read the result back from the status API.

mod common;

use chrono::NaiveDate;
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use binday::config::Config;
use binday::fanout::{FanoutCoordinator, DEFAULT_LOCATION, DEFAULT_TITLE};
use binday::integrations::IntegrationRegistry;
use binday::models::CollectionResult;
use binday::scraper::CollectionScraper;
use binday::session::{BackoffPolicy, RemoteSession};
use common::{mount_grid_result, mount_lookup_form, WebDriverStub};

const ENV_VARS: &[&str] = &[
    "POSTCODE",
    "ADDRESS_ID",
    "ENABLE_OUTLOOK",
    "ENABLE_MQTT",
    "ENABLE_WEBHOOK",
    "WEBHOOK_URL",
    "ENABLE_REST_API",
    "LOOKUP_URL",
];

fn load_config(dir: &TempDir, webhook_url: &str, lookup_url: &str) -> Config {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
    let content = format!(
        r#"
        [address]
        postcode = "BT1 1AA"
        address_id = "190011390"

        [calendars.outlook]
        enabled = false

        [webhook]
        enabled = true
        url = "{webhook_url}"

        [status]
        enabled = true
        host = "127.0.0.1"
        port = 0

        [webdriver]
        lookup_url = "{lookup_url}"
        "#
    );
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    Config::load(Some(&path)).unwrap()
}

/// Scrape, fan out and serve one collection date end to end
#[tokio::test]
#[serial]
async fn test_scrape_to_delivery() {
    let stub = WebDriverStub::start().await;
    mount_lookup_form(&stub, &[("190011390", "1 Example Street, Belfast")]).await;
    mount_grid_result(&stub, "Weekly Collection Every Sat 15 Mar 2025").await;

    let receiver = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(serde_json::json!({
            "event": "bin_collection",
            "title": DEFAULT_TITLE,
            "date": "2025-03-15",
            "day_of_week": "Saturday",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&receiver)
        .await;

    let dir = TempDir::new().unwrap();
    let config = load_config(&dir, &receiver.uri(), &format!("{}/lookup", stub.endpoint()));
    config.validate_for_run().unwrap();

    let registry = IntegrationRegistry::build(&config).await;
    assert_eq!(registry.backend_names(), vec!["webhook"]);

    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();
    let scraper_config = config.scraper_config();
    assert!(scraper_config.lookup_url.ends_with("/lookup"));
    let result = CollectionScraper::new(&session, &scraper_config)
        .scrape(&config.address())
        .await
        .unwrap();
    session.close().await;

    let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    assert_eq!(result, CollectionResult::Success(date));

    let report = FanoutCoordinator::new(&registry)
        .publish(date, DEFAULT_TITLE, DEFAULT_LOCATION)
        .await;
    assert!(report.all_succeeded());
    assert_eq!(report.delivered(), 1);
    assert_eq!(report.deliveries()[0].backend, "webhook");

    let addr = registry.status_handle().unwrap().addr().unwrap();
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/bin-collection"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["date"], "2025-03-15");
    assert_eq!(body["day_of_week"], "Saturday");
}

/// A failing backend is reported but never takes the run down, and the
/// status API still learns the date
#[tokio::test]
#[serial]
async fn test_backend_failure_does_not_fail_run() {
    let stub = WebDriverStub::start().await;
    mount_lookup_form(&stub, &[("190011390", "1 Example Street, Belfast")]).await;
    mount_grid_result(&stub, "Weekly Collection Every Sat 15 Mar 2025").await;

    let receiver = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&receiver)
        .await;

    let dir = TempDir::new().unwrap();
    let config = load_config(&dir, &receiver.uri(), &format!("{}/lookup", stub.endpoint()));
    let registry = IntegrationRegistry::build(&config).await;

    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();
    let scraper_config = config.scraper_config();
    let result = CollectionScraper::new(&session, &scraper_config)
        .scrape(&config.address())
        .await
        .unwrap();
    session.close().await;
    let date = result.date().unwrap();

    let report = FanoutCoordinator::new(&registry)
        .publish(date, DEFAULT_TITLE, DEFAULT_LOCATION)
        .await;
    assert_eq!(report.failed(), 1);
    assert!(!report.all_succeeded());

    // The status endpoint is updated regardless of delivery outcomes
    let addr = registry.status_handle().unwrap().addr().unwrap();
    let response = reqwest::get(format!("http://{addr}/api/bin-collection"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let health: serde_json::Value = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}
