use axum::{routing::get, Router};

use crate::state::AppState;

/// GET /healthz -- fixed liveness response.
async fn healthz() -> &'static str {
    "OK\n"
}

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}
