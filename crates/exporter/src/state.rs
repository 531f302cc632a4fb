use std::sync::Arc;

use egain_core::sensor::SensorRegistry;
use tokio::sync::watch;

use crate::metrics::MetricsPublisher;
use crate::scheduler::SchedulerState;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the publisher is behind an `Arc`, the registry
/// holds `Arc`ed sensors, and watch receivers clone by handle.
#[derive(Clone)]
pub struct AppState {
    /// Gauge Set rendered by `/metrics`.
    pub publisher: Arc<MetricsPublisher>,
    /// Configured sensors, for `/sensors`.
    pub registry: SensorRegistry,
    /// Live scheduler state.
    pub scheduler_state: watch::Receiver<SchedulerState>,
}
