//! Prometheus metrics for sensor readings.
//!
//! [`MetricsPublisher`] owns the Gauge Set: temperature and humidity
//! gauges keyed by `(sensor, location)`, plus a capture-time gauge, a
//! staleness histogram and a per-outcome fetch counter. All of them live
//! in a private [`Registry`] so the exporter never exposes anything it
//! did not register itself. The prometheus vectors synchronise
//! internally, so publishes from concurrent fetch tasks and reads from
//! the scrape handler need no extra locking.

use chrono::{DateTime, Utc};
use egain_core::metric_names::{
    LABEL_LOCATION, LABEL_OUTCOME, LABEL_SENSOR, METRIC_FETCH_TOTAL, METRIC_HUMIDITY,
    METRIC_READING_STALENESS, METRIC_READING_TIMESTAMP, METRIC_TEMPERATURE, OUTCOME_INVALID,
    OUTCOME_SUCCESS,
};
use egain_core::reading::Reading;
use egain_core::sensor::Sensor;
use prometheus::proto::Metric;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Staleness buckets in seconds, from "fresh" up to two hours.
const STALENESS_BUCKETS: [f64; 9] = [15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0];

pub struct MetricsPublisher {
    temperature: GaugeVec,
    humidity: GaugeVec,
    reading_timestamp: GaugeVec,
    staleness: HistogramVec,
    fetches: IntCounterVec,
    registry: Registry,
}

impl MetricsPublisher {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let sensor_labels = [LABEL_SENSOR, LABEL_LOCATION];

        let temperature = GaugeVec::new(
            Opts::new(METRIC_TEMPERATURE, "Indoor temperature in degrees Celsius"),
            &sensor_labels,
        )?;
        registry.register(Box::new(temperature.clone()))?;

        let humidity = GaugeVec::new(
            Opts::new(METRIC_HUMIDITY, "Indoor relative humidity as a percentage"),
            &sensor_labels,
        )?;
        registry.register(Box::new(humidity.clone()))?;

        let reading_timestamp = GaugeVec::new(
            Opts::new(
                METRIC_READING_TIMESTAMP,
                "Capture time of the last published reading, in unix seconds",
            ),
            &sensor_labels,
        )?;
        registry.register(Box::new(reading_timestamp.clone()))?;

        let staleness = HistogramVec::new(
            HistogramOpts::new(
                METRIC_READING_STALENESS,
                "Age of a reading's capture time when it was published, in seconds",
            )
            .buckets(STALENESS_BUCKETS.to_vec()),
            &sensor_labels,
        )?;
        registry.register(Box::new(staleness.clone()))?;

        let fetches = IntCounterVec::new(
            Opts::new(METRIC_FETCH_TOTAL, "Sensor fetch attempts by outcome"),
            &[LABEL_SENSOR, LABEL_LOCATION, LABEL_OUTCOME],
        )?;
        registry.register(Box::new(fetches.clone()))?;

        Ok(Self {
            temperature,
            humidity,
            reading_timestamp,
            staleness,
            fetches,
            registry,
        })
    }

    /// Publish `reading` for `sensor`, overwriting the previous values.
    ///
    /// Returns `false` without touching any metric if the reading has no
    /// capture timestamp.
    pub fn publish(&self, sensor: &Sensor, reading: &Reading) -> bool {
        self.publish_at(sensor, reading, Utc::now())
    }

    /// Same as [`publish`](Self::publish) with an explicit "now" for the
    /// staleness observation.
    pub fn publish_at(&self, sensor: &Sensor, reading: &Reading, now: DateTime<Utc>) -> bool {
        let Some(captured_at) = reading.captured_at() else {
            return false;
        };
        let labels = [sensor.id(), sensor.location()];

        self.temperature
            .with_label_values(&labels)
            .set(reading.temperature);
        self.humidity.with_label_values(&labels).set(reading.humidity);
        self.reading_timestamp
            .with_label_values(&labels)
            .set(captured_at.timestamp_millis() as f64 / 1000.0);

        // Upstream clocks can run ahead of ours.
        let age = (now - captured_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.staleness.with_label_values(&labels).observe(age);

        true
    }

    /// Count one fetch attempt for `sensor` under `outcome`.
    pub fn record_fetch(&self, sensor: &Sensor, outcome: &str) {
        self.fetches
            .with_label_values(&[sensor.id(), sensor.location(), outcome])
            .inc();
    }

    pub fn record_success(&self, sensor: &Sensor) {
        self.record_fetch(sensor, OUTCOME_SUCCESS);
    }

    pub fn record_invalid(&self, sensor: &Sensor) {
        self.record_fetch(sensor, OUTCOME_INVALID);
    }

    /// Current temperature gauge for a key, `None` if never published.
    pub fn temperature(&self, sensor_id: &str, location: &str) -> Option<f64> {
        self.find(METRIC_TEMPERATURE, &[(LABEL_SENSOR, sensor_id), (LABEL_LOCATION, location)])
            .map(|m| m.get_gauge().get_value())
    }

    /// Current humidity gauge for a key, `None` if never published.
    pub fn humidity(&self, sensor_id: &str, location: &str) -> Option<f64> {
        self.find(METRIC_HUMIDITY, &[(LABEL_SENSOR, sensor_id), (LABEL_LOCATION, location)])
            .map(|m| m.get_gauge().get_value())
    }

    /// Number of staleness observations recorded for a key.
    pub fn staleness_samples(&self, sensor_id: &str, location: &str) -> u64 {
        self.find(
            METRIC_READING_STALENESS,
            &[(LABEL_SENSOR, sensor_id), (LABEL_LOCATION, location)],
        )
        .map(|m| m.get_histogram().get_sample_count())
        .unwrap_or(0)
    }

    /// Number of fetches recorded for a key under `outcome`.
    pub fn fetch_count(&self, sensor_id: &str, location: &str, outcome: &str) -> u64 {
        self.find(
            METRIC_FETCH_TOTAL,
            &[
                (LABEL_SENSOR, sensor_id),
                (LABEL_LOCATION, location),
                (LABEL_OUTCOME, outcome),
            ],
        )
        .map(|m| m.get_counter().get_value() as u64)
        .unwrap_or(0)
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn find(&self, name: &str, labels: &[(&str, &str)]) -> Option<Metric> {
        self.registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == name)?
            .get_metric()
            .iter()
            .find(|metric| {
                labels.iter().all(|(key, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
                })
            })
            .cloned()
    }
}
