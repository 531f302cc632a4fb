//! One poll cycle over every configured sensor.
//!
//! [`Poller::run_cycle`] fetches all sensors concurrently in a
//! [`JoinSet`], sharing the client's global rate limiter. Results are
//! handled as each task finishes, so a slow or failing sensor never
//! delays or blocks publication for the others. Failures are logged and
//! counted, never propagated: a cycle with zero successes is still a
//! completed cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use egain_client::{FetchError, ReadingSource};
use egain_core::reading::Reading;
use egain_core::sensor::{Sensor, SensorRegistry};
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::metrics::MetricsPublisher;

/// A reading that passed validation and was published.
#[derive(Debug, Clone)]
pub struct PublishedReading {
    pub sensor: Arc<Sensor>,
    pub reading: Reading,
}

/// Outcome of one cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub published: Vec<PublishedReading>,
    /// Transport, status, timeout and decode failures, plus task panics.
    pub failed: usize,
    /// Readings without a capture timestamp.
    pub invalid: usize,
    /// Fetches stopped by the cancellation token.
    pub cancelled: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn published_ids(&self) -> Vec<&str> {
        self.published.iter().map(|p| p.sensor.id()).collect()
    }
}

pub struct Poller {
    registry: SensorRegistry,
    source: Arc<dyn ReadingSource>,
    publisher: Arc<MetricsPublisher>,
}

impl Poller {
    pub fn new(
        registry: SensorRegistry,
        source: Arc<dyn ReadingSource>,
        publisher: Arc<MetricsPublisher>,
    ) -> Self {
        Self {
            registry,
            source,
            publisher,
        }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    /// Fetch every sensor once and publish the valid readings.
    ///
    /// Returns once every per-sensor task has finished. When `cancel`
    /// fires, in-flight fetches abort with [`FetchError::Cancelled`];
    /// readings already published stay published.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let mut tasks = JoinSet::new();
        let mut task_sensors: HashMap<Id, Arc<Sensor>> = HashMap::new();

        for sensor in self.registry.sensors() {
            let sensor = Arc::clone(sensor);
            let source = Arc::clone(&self.source);
            let cancel = cancel.clone();

            let task_sensor = Arc::clone(&sensor);
            let handle = tasks.spawn(async move {
                tracing::debug!(
                    sensor_id = sensor.id(),
                    location = sensor.location(),
                    "Fetching sensor reading",
                );
                let result = source.fetch(sensor.id(), &cancel).await;
                (sensor, result)
            });
            task_sensors.insert(handle.id(), task_sensor);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((sensor, Ok(reading))) => self.accept(sensor, reading, &mut report),
                Ok((sensor, Err(e))) => self.reject(&sensor, e, &mut report),
                Err(e) => {
                    let sensor = task_sensors.get(&e.id());
                    tracing::error!(
                        sensor_id = sensor.map(|s| s.id()),
                        location = sensor.map(|s| s.location()),
                        error = %e,
                        "Sensor fetch task failed",
                    );
                    report.failed += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            published = report.published.len(),
            failed = report.failed,
            invalid = report.invalid,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Poll cycle complete",
        );

        report
    }

    fn accept(&self, sensor: Arc<Sensor>, reading: Reading, report: &mut CycleReport) {
        let Some(captured_at) = reading.captured_at() else {
            tracing::warn!(
                sensor_id = sensor.id(),
                location = sensor.location(),
                "Discarding invalid reading without capture timestamp",
            );
            self.publisher.record_invalid(&sensor);
            report.invalid += 1;
            return;
        };

        sensor.record_reading(captured_at);
        self.publisher.publish(&sensor, &reading);
        self.publisher.record_success(&sensor);

        tracing::info!(
            sensor_id = sensor.id(),
            location = sensor.location(),
            temperature = reading.temperature,
            humidity = reading.humidity,
            timestamp = %captured_at,
            "Fetched sensor reading",
        );

        report.published.push(PublishedReading { sensor, reading });
    }

    fn reject(&self, sensor: &Sensor, error: FetchError, report: &mut CycleReport) {
        if error.is_cancelled() {
            tracing::debug!(
                sensor_id = sensor.id(),
                location = sensor.location(),
                "Sensor fetch cancelled",
            );
            report.cancelled += 1;
            return;
        }

        tracing::warn!(
            sensor_id = sensor.id(),
            location = sensor.location(),
            error = %error,
            "Failed to fetch sensor reading",
        );
        self.publisher.record_fetch(sensor, error.outcome());
        report.failed += 1;
    }
}
