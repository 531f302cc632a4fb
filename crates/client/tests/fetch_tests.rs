//! Integration tests for [`EgainClient`] against an in-process upstream.
//!
//! Each test binds an axum server on an ephemeral port that mimics the
//! eGain indoor endpoint, with special sensor ids for failure modes.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use egain_client::{EgainClient, FetchError, RateLimiter, ReadingSource};

// ---------------------------------------------------------------------------
// Fake upstream
// ---------------------------------------------------------------------------

async fn indoor(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "kitchen-sensor" => (
            [("content-type", "application/json")],
            r#"{"temperature": 21.5, "humidity": 40.0, "timestamp": "2024-01-01T00:00:00Z"}"#,
        )
            .into_response(),
        "kitchen-sensor?x/y#z" => (
            [("content-type", "application/json")],
            r#"{"temperature": 5.0, "humidity": 90.0, "timestamp": "2024-01-01T00:00:00Z"}"#,
        )
            .into_response(),
        "empty" => r#"{"temperature": 0, "humidity": 0, "timestamp": ""}"#.into_response(),
        "garbage" => "<html>maintenance</html>".into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "{}".into_response()
        }
        _ => (StatusCode::NOT_FOUND, "unknown sensor").into_response(),
    }
}

/// Start the fake upstream and return its base URL.
async fn spawn_upstream() -> String {
    let app = Router::new().route("/api/indoor/{id}", get(indoor));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/indoor")
}

fn client(base_url: String, timeout: Duration) -> EgainClient {
    EgainClient::new(base_url, Arc::new(RateLimiter::default()), timeout)
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_decodes_reading() {
    let client = client(spawn_upstream().await, Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let reading = client.fetch("kitchen-sensor", &cancel).await.unwrap();

    assert_eq!(reading.temperature, 21.5);
    assert_eq!(reading.humidity, 40.0);
    assert!(reading.is_valid());
}

/// Reserved characters in an id reach the upstream as part of that id
/// instead of turning into a query, fragment or extra path segment.
#[tokio::test]
async fn reserved_characters_stay_in_sensor_id() {
    let client = client(spawn_upstream().await, Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let reading = client.fetch("kitchen-sensor?x/y#z", &cancel).await.unwrap();

    assert_eq!(reading.temperature, 5.0);
    assert_eq!(reading.humidity, 90.0);
}

/// An empty payload decodes fine; validity is the caller's concern.
#[tokio::test]
async fn empty_payload_decodes_but_is_invalid() {
    let client = client(spawn_upstream().await, Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let reading = client.fetch("empty", &cancel).await.unwrap();
    assert!(!reading.is_valid());
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_success_status_is_reported() {
    let client = client(spawn_upstream().await, Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let err = client.fetch("nope", &cancel).await.unwrap_err();
    assert_matches!(err, FetchError::Status { status: 404, ref body } if body == "unknown sensor");
    assert_eq!(err.outcome(), "status");
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let client = client(spawn_upstream().await, Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let err = client.fetch("garbage", &cancel).await.unwrap_err();
    assert_matches!(err, FetchError::Decode(_));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let client = client(spawn_upstream().await, Duration::from_millis(200));
    let cancel = CancellationToken::new();

    let started = std::time::Instant::now();
    let err = client.fetch("slow", &cancel).await.unwrap_err();

    assert_matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// The timeout covers the rate-limit wait: a fetch stuck behind a
/// drained bucket fails with `Timeout` and hands its token back.
#[tokio::test]
async fn rate_limit_wait_counts_toward_timeout() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 1));
    let client = EgainClient::new(
        spawn_upstream().await,
        Arc::clone(&limiter),
        Duration::from_millis(200),
    );
    let cancel = CancellationToken::new();

    client.fetch("kitchen-sensor", &cancel).await.unwrap();

    let started = std::time::Instant::now();
    let err = client.fetch("kitchen-sensor", &cancel).await.unwrap_err();

    assert_matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(200));
    assert_eq!(err.outcome(), "timeout");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(limiter.available() > -0.5);
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{addr}/api/indoor"), Duration::from_secs(5));
    let cancel = CancellationToken::new();

    let err = client.fetch("kitchen-sensor", &cancel).await.unwrap_err();
    assert_matches!(err, FetchError::Transport(_));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// A fetch parked on the rate limiter returns promptly on cancellation
/// instead of waiting out the token interval or its own timeout.
#[tokio::test]
async fn cancellation_interrupts_rate_limit_wait() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 1));
    let client = Arc::new(EgainClient::new(
        spawn_upstream().await,
        Arc::clone(&limiter),
        Duration::from_secs(30),
    ));
    let cancel = CancellationToken::new();

    client.fetch("kitchen-sensor", &cancel).await.unwrap();

    let waiting = {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        tokio::spawn(async move { client.fetch("kitchen-sensor", &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = std::time::Instant::now();
    cancel.cancel();

    let err = waiting.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(1));

    // The abandoned reservation went back to the bucket.
    assert!(limiter.available() > -0.5);
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_request() {
    let client = Arc::new(client(spawn_upstream().await, Duration::from_secs(30)));
    let cancel = CancellationToken::new();

    let in_flight = {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        tokio::spawn(async move { client.fetch("slow", &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(2), in_flight)
        .await
        .expect("fetch should stop promptly")
        .unwrap()
        .unwrap_err();
    assert_matches!(err, FetchError::Cancelled);
}
