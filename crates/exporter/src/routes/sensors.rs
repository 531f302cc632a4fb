use axum::extract::State;
use axum::{routing::get, Json, Router};
use egain_core::sensor::SensorSnapshot;
use serde::Serialize;

use crate::scheduler::SchedulerState;
use crate::state::AppState;

/// Sensor status response payload.
#[derive(Serialize)]
pub struct SensorsResponse {
    pub scheduler: SchedulerState,
    pub sensors: Vec<SensorSnapshot>,
}

/// GET /sensors -- configured sensors and the capture time of their
/// last accepted reading.
async fn list_sensors(State(state): State<AppState>) -> Json<SensorsResponse> {
    Json(SensorsResponse {
        scheduler: *state.scheduler_state.borrow(),
        sensors: state.registry.snapshot(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/sensors", get(list_sensors))
}
