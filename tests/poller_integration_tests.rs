use std::fs::{self, File};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use listen::core::guard::CycleLimit;
use listen::{
    DomContainer, EventSource, FailurePolicy, HttpEventSource, Location, LoopExit, PollError,
    PollStatus, Poller, PollerConfig, SubscribeMode, WriterContainer, page_guard,
};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Mounts a poll endpoint that always answers with `body`.
async fn mount_poll(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/poll/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Counts requests the server has received on `route`.
async fn received_on(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

/// Mounts a subscribe endpoint that must be hit exactly `times` times.
async fn expect_subscribe(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/poll/subscribe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(times)
        .mount(server)
        .await;
}

fn poller_for(server: &MockServer, config: PollerConfig) -> Poller {
    Poller::new(Arc::new(HttpEventSource::new(server.uri())), config)
}

fn inner_htmls(container: &DomContainer) -> Vec<&str> {
    container
        .children()
        .iter()
        .map(|e| e.inner_html.as_str())
        .collect()
}

// ============================================================================
// Poll Cycle
// ============================================================================

#[tokio::test]
async fn test_started_response_renders_events_in_order() {
    let mock_server = MockServer::start().await;
    mount_poll(
        &mock_server,
        json!({"poll": "started", "events": ["<b>hi</b>", "<i>bye</i>"]}),
    )
    .await;
    expect_subscribe(&mock_server, 0).await;

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = DomContainer::new();

    let report = assert_ok!(poller.poll_once(&mut container).await);

    assert_eq!(report.rendered, 2);
    assert!(!report.subscribe.was_issued());
    assert_eq!(inner_htmls(&container), vec!["<b>hi</b>", "<i>bye</i>"]);
}

#[tokio::test]
async fn test_not_started_response_subscribes_once() {
    let mock_server = MockServer::start().await;
    mount_poll(&mock_server, json!({"poll": "not started", "events": []})).await;
    expect_subscribe(&mock_server, 1).await;

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = DomContainer::new();

    let report = assert_ok!(poller.poll_once(&mut container).await);

    assert_eq!(report.status, PollStatus::NotStarted);
    assert_eq!(report.rendered, 0);
    assert!(container.is_empty());
}

#[tokio::test]
async fn test_detached_subscribe_reaches_server() {
    let mock_server = MockServer::start().await;
    mount_poll(&mock_server, json!({"poll": "not started"})).await;
    expect_subscribe(&mock_server, 1).await;

    let config = PollerConfig {
        subscribe_mode: SubscribeMode::Detached,
        ..Default::default()
    };
    let poller = poller_for(&mock_server, config);
    let mut container = DomContainer::new();

    let report = assert_ok!(poller.poll_once(&mut container).await);
    if let listen::poller::SubscribeOutcome::Detached(handle) = report.subscribe {
        assert_ok!(handle.await);
    } else {
        panic!("expected a detached subscribe");
    }
}

#[tokio::test]
async fn test_missing_events_renders_nothing() {
    let mock_server = MockServer::start().await;
    mount_poll(&mock_server, json!({"poll": "started"})).await;

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = DomContainer::new();

    let report = assert_ok!(poller.poll_once(&mut container).await);

    assert_eq!(report.rendered, 0);
    assert!(container.is_empty());
}

// ============================================================================
// HTTP Source Errors
// ============================================================================

#[tokio::test]
async fn test_poll_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poll/poll"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let source = HttpEventSource::new(mock_server.uri());
    let result = source.poll().await;

    assert!(matches!(
        result,
        Err(PollError::Api { status: 500, ref message }) if message == "Internal Server Error"
    ));
}

#[tokio::test]
async fn test_poll_invalid_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poll/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let source = HttpEventSource::new(mock_server.uri());
    let err = assert_err!(source.poll().await);

    assert!(matches!(err, PollError::Parse(_)));
}

#[tokio::test]
async fn test_poll_connection_refused() {
    // Nothing listens on port 1
    let source = HttpEventSource::new("http://127.0.0.1:1");
    let err = assert_err!(source.poll().await);

    assert!(matches!(err, PollError::Network(_)));
}

#[tokio::test]
async fn test_subscribe_ignores_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/poll/subscribe"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = HttpEventSource::new(mock_server.uri());

    assert_ok!(source.subscribe().await);
}

// ============================================================================
// Poll Loop
// ============================================================================

#[tokio::test]
async fn test_loop_subscribes_then_renders() {
    let mock_server = MockServer::start().await;

    // First poll: not started. Every poll after that: one event.
    Mock::given(method("GET"))
        .and(path("/poll/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"poll": "not started"})))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_poll(&mock_server, json!({"poll": "started", "events": ["<p>tick</p>"]})).await;
    expect_subscribe(&mock_server, 1).await;

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = DomContainer::new();

    let summary = poller.run(&mut container, &CycleLimit::new(3)).await;

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.subscribes, 1);
    assert_eq!(summary.rendered, 2);
    assert_eq!(inner_htmls(&container), vec!["<p>tick</p>", "<p>tick</p>"]);
    assert!(matches!(summary.exit, LoopExit::NavigatedAway));

    assert_eq!(received_on(&mock_server, "/poll/poll").await, 3);
}

#[tokio::test]
async fn test_loop_keeps_going_after_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poll/poll"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_poll(&mock_server, json!({"poll": "started", "events": ["<p>ok</p>"]})).await;

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = DomContainer::new();

    let summary = poller.run(&mut container, &CycleLimit::new(2)).await;

    assert_eq!(summary.failures, 1);
    assert_eq!(summary.cycles, 1);
    assert_eq!(inner_htmls(&container), vec!["<p>ok</p>"]);
}

#[tokio::test]
async fn test_loop_stop_policy_halts_on_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poll/poll"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = PollerConfig {
        failure_policy: FailurePolicy::Stop,
        ..Default::default()
    };
    let poller = poller_for(&mock_server, config);
    let mut container = DomContainer::new();

    let summary = poller.run(&mut container, &CycleLimit::new(10)).await;

    assert!(matches!(
        summary.exit,
        LoopExit::Failed(PollError::Api { status: 503, .. })
    ));
    assert_eq!(summary.failures, 1);
    assert!(container.is_empty());
}

#[tokio::test]
async fn test_detached_subscribe_sent_before_loop_returns() {
    let mock_server = MockServer::start().await;
    mount_poll(&mock_server, json!({"poll": "not started"})).await;
    expect_subscribe(&mock_server, 1).await;

    let config = PollerConfig {
        subscribe_mode: SubscribeMode::Detached,
        ..Default::default()
    };
    let poller = poller_for(&mock_server, config);
    let mut container = DomContainer::new();

    let summary = poller.run(&mut container, &CycleLimit::new(1)).await;

    // Nothing else is awaited: the loop itself waited for the POST
    assert_eq!(received_on(&mock_server, "/poll/subscribe").await, 1);
    assert_eq!(summary.subscribes, 1);
    assert_eq!(summary.abandoned_subscribes, 0);
}

// ============================================================================
// Command-line Paths
// ============================================================================

#[tokio::test]
async fn test_once_guard_runs_a_single_cycle() {
    let mock_server = MockServer::start().await;
    mount_poll(&mock_server, json!({"poll": "started", "events": ["<p>one</p>"]})).await;

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = DomContainer::new();
    let guard = page_guard(Location::new("/event"), "/event", Some(1));

    let summary = poller.run(&mut container, guard.as_ref()).await;

    assert_eq!(summary.cycles, 1);
    assert_eq!(inner_htmls(&container), vec!["<p>one</p>"]);
    assert_eq!(received_on(&mock_server, "/poll/poll").await, 1);
}

#[tokio::test]
async fn test_navigating_away_mid_loop_stops_polling() {
    let mock_server = MockServer::start().await;
    mount_poll(&mock_server, json!({"poll": "started", "events": []})).await;

    let config = PollerConfig {
        delay: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let poller = poller_for(&mock_server, config);
    let mut container = DomContainer::new();
    let location = Location::new("/event");
    let guard = page_guard(location.clone(), "/event", None);

    // Same as the interrupt handler: another task moves off the page
    let interrupt = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        location.navigate("/");
    });

    let summary = poller.run(&mut container, guard.as_ref()).await;
    assert_ok!(interrupt.await);

    assert!(matches!(summary.exit, LoopExit::NavigatedAway));
    assert!(summary.cycles >= 1);
    assert_eq!(summary.failures, 0);
}

#[tokio::test]
async fn test_output_file_receives_rendered_events() {
    let mock_server = MockServer::start().await;
    mount_poll(
        &mock_server,
        json!({"poll": "started", "events": ["<b>a</b>", "<i>b</i>"]}),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("events.html");

    let poller = poller_for(&mock_server, PollerConfig::default());
    let mut container = WriterContainer::new(File::create(&output).unwrap());
    let guard = page_guard(Location::new("/event"), "/event", Some(1));

    let summary = poller.run(&mut container, guard.as_ref()).await;
    assert_ok!(container.into_inner().flush());

    assert_eq!(summary.rendered, 2);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "<div><b>a</b></div>\n<div><i>b</i></div>\n"
    );
}
