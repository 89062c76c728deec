use axum::{routing::get, Router};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Keep-alive probe used by the hosting platform.
async fn health() -> &'static str {
    "ok"
}
