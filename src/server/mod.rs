//! Same-origin geocoding proxy for the dashboard's booking forms.
//!
//! Browsers cannot set the `User-Agent` Nominatim asks for, so forms call
//! these routes and the server runs the picker policies on their behalf.

mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/reverse", get(handlers::reverse))
        .route("/api/health", get(handlers::health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "Xequtive locator listening on http://{}", addr);
    axum::serve(listener, app).await
}
