//! API layer - routes, handlers, and middleware

pub mod handlers;
pub mod headers;
pub mod middleware;
pub mod routes;

use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_request_body_size;
    let cors_origins = state.config.server.cors_origins.clone();

    // Bearer-authenticated surface
    let authenticated = Router::new()
        .merge(routes::patients::patient_routes())
        .merge(routes::export::export_routes())
        .merge(routes::issuer::issuer_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/favicon.ico", get(favicon))
        .merge(routes::metrics::metrics_routes())
        .merge(authenticated)
        // Collaborator reads; each table carries its own access gate
        .merge(routes::gated::gated_routes(state.clone()))
        .merge(routes::issuer::callback_routes())
        .with_state(state)
        // Add middleware (applied in reverse order)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
        .layer(middleware::compression())
        .layer(middleware::cors(&cors_origins))
        // Limit request body size to prevent DoS via large payloads
        .layer(DefaultBodyLimit::max(max_body_size))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "raito-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn favicon() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
