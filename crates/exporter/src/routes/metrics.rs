use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};

use crate::state::AppState;

/// GET /metrics -- Prometheus text exposition of the Gauge Set.
async fn scrape(State(state): State<AppState>) -> Response {
    match state.publisher.export() {
        Ok(body) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(scrape))
}
