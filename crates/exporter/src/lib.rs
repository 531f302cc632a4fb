//! `egain-exporter` library crate.
//!
//! Polls eGain indoor sensors on a fixed cadence and republishes their
//! readings as Prometheus gauges. The binary entrypoint lives in
//! `main.rs`; everything it wires together is exposed here so
//! integration tests can drive the same components.

pub mod config;
pub mod metrics;
pub mod poller;
pub mod routes;
pub mod scheduler;
pub mod state;
