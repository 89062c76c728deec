pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use watch::SessionRegistry;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub started_at: DateTime<Utc>,
}

/// Build and run the keep-alive HTTP server.
///
/// Hosting platforms probe `$PORT` to keep the container alive; `/status`
/// additionally exposes a small operational snapshot.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = Router::new()
        .merge(routes::health_router())
        .merge(routes::status_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "Keep-alive server listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
