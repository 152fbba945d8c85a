//! Credential issuer routes

use crate::api::handlers::issuer;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Status reads for patient owners and staff.
pub fn issuer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/issuer/issuance-response/:sessionId",
            get(issuer::issuance_response),
        )
        .route("/issuer/getAll/:patientId", get(issuer::patient_sessions))
}

/// Issuer-to-server callback; authenticated by api-key, not bearer token.
pub fn callback_routes() -> Router<AppState> {
    Router::new().route("/issuer/issuanceCallback", post(issuer::issuance_callback))
}
