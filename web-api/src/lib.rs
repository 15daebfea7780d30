//! HTTP surface: REST endpoints for trends, contacts, ideas and outreach, plus
//! the Razorpay webhook receiver.

pub mod auth;
pub mod error;
pub mod rest;
pub mod state;


use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use error::ApiError;
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(rest::health))
        .route("/api/reddit-trends", get(rest::reddit_trends))
        .route("/api/contacts/discover", post(rest::discover_contacts))
        .route("/api/webhooks/razorpay", post(rest::webhook::razorpay_webhook))
        .route("/api/ideas", post(rest::ideas::create_idea))
        .route("/api/ideas/{id}/validate", post(rest::ideas::validate_idea))
        .route("/api/content", post(rest::ideas::create_content))
        .route("/api/messages", post(rest::messages::create_message))
        .route("/api/messages/variants", get(rest::messages::variant_stats))
        .route("/api/messages/{id}/status", post(rest::messages::set_status))
        .route("/api/messages/{id}/outcome", post(rest::messages::record_outcome))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("painscout API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
