//! Domain types shared by the eGain sensor client and the exporter.
//!
//! Nothing in this crate performs I/O: it describes the configured
//! sensors, the readings decoded from the upstream API, and the metric
//! names the exporter publishes them under.

pub mod error;
pub mod metric_names;
pub mod reading;
pub mod sensor;
