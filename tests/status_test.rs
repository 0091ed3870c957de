//! Status API tests over a real listener
//!
//! The server binds an ephemeral port; requests go through a plain HTTP
//! client so routing, status codes and body shapes are all exercised.

use chrono::{Duration, Local, NaiveDate};

use binday::models::CollectionAttributes;
use binday::status::StatusServer;

async fn started() -> binday::status::StatusHandle {
    let server = StatusServer::bind("127.0.0.1", 0).await.unwrap();
    server.spawn()
}

fn base(handle: &binday::status::StatusHandle) -> String {
    format!("http://{}", handle.addr().unwrap())
}

/// Before any scrape the collection endpoint answers 404 with a JSON error
#[tokio::test]
async fn test_no_date_is_404() {
    let handle = started().await;

    let response = reqwest::get(format!("{}/api/bin-collection", base(&handle)))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No bin collection date available");
}

/// After an update the endpoint reports the full attribute set
#[tokio::test]
async fn test_published_date_is_served() {
    let handle = started().await;

    let date = Local::now().date_naive() + Duration::days(5);
    handle
        .update(&CollectionAttributes::new("Bin collection", date))
        .await;

    let response = reqwest::get(format!("{}/api/bin-collection", base(&handle)))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["date"], date.format("%Y-%m-%d").to_string());
    assert_eq!(body["day_of_week"], date.format("%A").to_string());
    assert_eq!(body["days_until"], 5);
    assert!(body["last_update"].as_str().unwrap().contains("T"));
}

/// The served countdown comes from the clock at request time, not from
/// the value stored when the date was published
#[tokio::test]
async fn test_countdown_recomputed_at_request_time() {
    let handle = started().await;

    // A month-old reference day leaves a stale countdown in the stored
    // attributes
    let today = Local::now().date_naive();
    let date = today + Duration::days(5);
    let attrs =
        CollectionAttributes::relative_to("Bin collection", date, today - Duration::days(30));
    assert_eq!(attrs.days_until, 35);
    handle.update(&attrs).await;

    let body: serde_json::Value = reqwest::get(format!("{}/api/bin-collection", base(&handle)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["days_until"], 5);
}

/// A later scrape replaces the served date
#[tokio::test]
async fn test_update_replaces_previous_date() {
    let handle = started().await;

    let first = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    handle
        .update(&CollectionAttributes::new("Bin collection", first))
        .await;
    let second = NaiveDate::from_ymd_opt(2025, 3, 22).unwrap();
    handle
        .update(&CollectionAttributes::new("Bin collection", second))
        .await;

    let body: serde_json::Value = reqwest::get(format!("{}/api/bin-collection", base(&handle)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["date"], "2025-03-22");
}

/// The health endpoint names the service and its version
#[tokio::test]
async fn test_health_endpoint() {
    let handle = started().await;

    let body: serde_json::Value = reqwest::get(format!("{}/api/health", base(&handle)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "binday-api");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

/// Unknown paths fall through to a plain 404
#[tokio::test]
async fn test_unknown_route_is_404() {
    let handle = started().await;

    let response = reqwest::get(format!("{}/api/nothing-here", base(&handle)))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

/// The server stops when its shutdown future resolves
#[tokio::test]
async fn test_graceful_shutdown() {
    let server = StatusServer::bind("127.0.0.1", 0).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = rx.await;
    }));

    // Served while running
    let response = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    tx.send(()).unwrap();
    task.await.unwrap().unwrap();

    // Refused once stopped
    assert!(reqwest::get(format!("http://{addr}/api/health")).await.is_err());
}
