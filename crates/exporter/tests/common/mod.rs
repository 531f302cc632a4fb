//! Shared fixtures for exporter integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use egain_client::{FetchError, RateLimiter, ReadingSource};
use egain_core::reading::Reading;
use egain_core::sensor::SensorRegistry;
use egain_exporter::metrics::MetricsPublisher;
use egain_exporter::poller::Poller;

pub const KITCHEN_READING: &str =
    r#"{"temperature": 21.5, "humidity": 40.0, "timestamp": "2024-01-01T00:00:00Z"}"#;

pub const BATH_READING: &str =
    r#"{"temperature": 19.0, "humidity": 65.0, "timestamp": "2024-01-01T00:00:00Z"}"#;

pub const BOGUS_READING: &str = r#"{"temperature": 0, "humidity": 0, "timestamp": ""}"#;

/// Scripted response for one fetch.
#[derive(Clone)]
pub enum Behavior {
    /// Decode this body as if the upstream returned it.
    Reply(&'static str),
    /// Reply after a delay (ignores cancellation, like a request that
    /// is already past the point of no return).
    SlowReply(Duration, &'static str),
    /// Fail with the error built by this function.
    Fail(fn() -> FetchError),
    /// Wait for a token from the shared limiter, honouring cancellation.
    RateLimited(&'static str),
    /// Block until cancelled, then take this long to unwind.
    UnwindAfterCancel(Duration),
    Panic,
}

/// In-memory [`ReadingSource`] driven by per-sensor scripts.
///
/// Each sensor's script is consumed front to back; the last entry
/// repeats forever.
pub struct FakeSource {
    scripts: Mutex<HashMap<String, VecDeque<Behavior>>>,
    limiter: Arc<RateLimiter>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::with_limiter(Arc::new(RateLimiter::default()))
    }

    pub fn with_limiter(limiter: Arc<RateLimiter>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            limiter,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn script(self, sensor_id: &str, behaviors: Vec<Behavior>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(sensor_id.to_string(), behaviors.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, sensor_id: &str) -> usize {
        self.calls().iter().filter(|id| *id == sensor_id).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_behavior(&self, sensor_id: &str) -> Option<Behavior> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.get_mut(sensor_id)?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }

    async fn run(
        &self,
        behavior: Option<Behavior>,
        cancel: &CancellationToken,
    ) -> Result<Reading, FetchError> {
        match behavior {
            Some(Behavior::Reply(body)) => Ok(Reading::from_json(body.as_bytes())?),
            Some(Behavior::SlowReply(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(Reading::from_json(body.as_bytes())?)
            }
            Some(Behavior::Fail(make)) => Err(make()),
            Some(Behavior::RateLimited(body)) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled),
                    _ = self.limiter.acquire() => Ok(Reading::from_json(body.as_bytes())?),
                }
            }
            Some(Behavior::UnwindAfterCancel(unwind)) => {
                cancel.cancelled().await;
                tokio::time::sleep(unwind).await;
                Err(FetchError::Cancelled)
            }
            Some(Behavior::Panic) => panic!("sensor driver exploded"),
            None => Err(FetchError::Status {
                status: 404,
                body: "unknown sensor".into(),
            }),
        }
    }
}

#[async_trait]
impl ReadingSource for FakeSource {
    async fn fetch(
        &self,
        sensor_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Reading, FetchError> {
        self.calls.lock().unwrap().push(sensor_id.to_string());
        let behavior = self.next_behavior(sensor_id);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.run(behavior, cancel).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }
}

/// A real [`reqwest::Error`] for the connection-failure path.
pub fn transport_error() -> FetchError {
    let err = reqwest::Client::new()
        .get("http://")
        .build()
        .expect_err("an empty host must not build");
    FetchError::Transport(err)
}

pub fn timeout_error() -> FetchError {
    FetchError::Timeout(Duration::from_secs(30))
}

pub fn build_poller(sensors: &str, source: Arc<FakeSource>) -> (Poller, Arc<MetricsPublisher>) {
    let registry = SensorRegistry::parse(sensors).unwrap();
    let publisher = Arc::new(MetricsPublisher::new().unwrap());
    let poller = Poller::new(registry, source, Arc::clone(&publisher));
    (poller, publisher)
}

/// In-memory sink for log lines emitted under [`capture_logs`].
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Send this thread's log output to a buffer until the guard is dropped.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
