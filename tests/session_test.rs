//! Integration tests for the remote session client using wiremock
//!
//! Covers connection retry behavior and the element verbs the lookup flow
//! depends on.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use binday::session::{BackoffPolicy, RemoteSession, SessionError};
use common::WebDriverStub;

fn quick_policy(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy {
        max_attempts,
        base_delay: Duration::from_millis(10),
    }
}

/// Opening a session against a healthy endpoint succeeds on the first attempt
#[tokio::test]
async fn test_connect_and_close() {
    let stub = WebDriverStub::start().await;

    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();
    assert_eq!(session.session_id(), common::SESSION_ID);

    session.close().await;
}

/// Transient failures while opening the session are retried
#[tokio::test]
async fn test_connect_retries_until_open() {
    let server = MockServer::start().await;

    // Refuse twice, then accept
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": { "sessionId": "late-1", "capabilities": {} } })),
        )
        .mount(&server)
        .await;

    let session = RemoteSession::connect_endpoint(&server.uri(), &quick_policy(5))
        .await
        .unwrap();
    assert_eq!(session.session_id(), "late-1");
}

/// Exhausting every attempt is fatal and reports the attempt count
#[tokio::test]
async fn test_connect_exhaustion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = RemoteSession::connect_endpoint(&server.uri(), &quick_policy(3))
        .await
        .unwrap_err();
    match err {
        SessionError::ConnectExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected ConnectExhausted, got {other:?}"),
    }
}

/// A failed element lookup surfaces as a typed absence, not a transport fault
#[tokio::test]
async fn test_find_maps_no_such_element() {
    let stub = WebDriverStub::start().await;
    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();

    let err = session.find("#NotOnThisPage").await.unwrap_err();
    match err {
        SessionError::NoSuchElement { selector } => assert_eq!(selector, "#NotOnThisPage"),
        other => panic!("expected NoSuchElement, got {other:?}"),
    }

    assert!(session.try_find("#NotOnThisPage").await.unwrap().is_none());
}

/// Polling for an element gives up after the timeout
#[tokio::test]
async fn test_wait_for_times_out() {
    let stub = WebDriverStub::start().await;
    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();

    let err = session
        .wait_for("#NeverRendered", Duration::from_millis(300))
        .await
        .unwrap_err();
    match err {
        SessionError::WaitTimeout {
            selector,
            waited_ms,
        } => {
            assert_eq!(selector, "#NeverRendered");
            assert_eq!(waited_ms, 300);
        }
        other => panic!("expected WaitTimeout, got {other:?}"),
    }
}

/// wait_for returns as soon as the element resolves
#[tokio::test]
async fn test_wait_for_finds_mounted_element() {
    let stub = WebDriverStub::start().await;
    stub.element("#ItemsGrid", "el-grid").await;

    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();
    let element = session
        .wait_for("#ItemsGrid", Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(element.id(), "el-grid");
}

/// Navigation plus a text read against a resolved element
#[tokio::test]
async fn test_navigate_and_read_text() {
    let stub = WebDriverStub::start().await;
    stub.element("#Banner", "el-banner").await;
    stub.text("el-banner", "Bin Collection Schedules").await;

    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();
    session.navigate("http://lookup.test/page").await.unwrap();

    let banner = session.find("#Banner").await.unwrap();
    let text = session.text(&banner).await.unwrap();
    assert_eq!(text, "Bin Collection Schedules");
}

/// A null attribute decodes to None
#[tokio::test]
async fn test_unset_attribute_is_none() {
    let stub = WebDriverStub::start().await;
    stub.element("#Opt", "el-opt").await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/session/{}/element/el-opt/attribute/value",
            common::SESSION_ID
        )))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": null })),
        )
        .mount(&stub.server)
        .await;

    let session = RemoteSession::connect_endpoint(&stub.endpoint(), &BackoffPolicy::default())
        .await
        .unwrap();
    let option = session.find("#Opt").await.unwrap();
    assert_eq!(session.attribute(&option, "value").await.unwrap(), None);
}
