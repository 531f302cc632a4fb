//! Canonical metric names and label keys published by the exporter.
//!
//! Dashboards and alert rules depend on these names, so they live in one
//! place instead of being spelled out at each registration site.

/// Indoor temperature in degrees Celsius.
pub const METRIC_TEMPERATURE: &str = "indoor_temperature";

/// Indoor relative humidity as a percentage.
pub const METRIC_HUMIDITY: &str = "indoor_humidity";

/// Capture time of the last published reading, as unix seconds.
pub const METRIC_READING_TIMESTAMP: &str = "indoor_reading_timestamp_seconds";

/// Age of a reading's capture time at the moment it was published.
pub const METRIC_READING_STALENESS: &str = "indoor_reading_staleness_seconds";

/// Fetch attempts by outcome.
pub const METRIC_FETCH_TOTAL: &str = "indoor_fetch_total";

pub const LABEL_SENSOR: &str = "sensor";
pub const LABEL_LOCATION: &str = "location";
pub const LABEL_OUTCOME: &str = "outcome";

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_INVALID: &str = "invalid";
