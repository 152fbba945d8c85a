//! Credential issuer callback and session status routes

use super::authorized_patient;
use crate::auth::AuthenticatedPrincipal;
use crate::services::issuer::IssuanceCallback;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::json;

const API_KEY_HEADER: &str = "api-key";

/// POST /issuer/issuanceCallback
///
/// Called by the issuer, authenticated with the shared `api-key` header
/// rather than a bearer token.
pub async fn issuance_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(callback): Json<IssuanceCallback>,
) -> Result<impl IntoResponse> {
    let expected = state.issuer.callback_api_key();
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if expected.is_empty() || presented != expected {
        return Err(Error::Unauthorized("invalid api-key".to_string()));
    }

    let session = state.issuer.handle_callback(callback).await?;
    tracing::info!(
        session_id = %session.id,
        status = ?session.session_data.status,
        "Issuance callback applied"
    );
    Ok(Json(json!({ "message": "ok" })))
}

/// GET /issuer/issuance-response/:sessionId
pub async fn issuance_response(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let session = state
        .repository
        .get_session(&session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
    let patient = state
        .repository
        .get_patient(&session.created_by)
        .await?
        .ok_or_else(Error::patient_not_found)?;
    principal.ensure_patient_access(&patient)?;
    Ok(Json(session.session_data))
}

/// GET /issuer/getAll/:patientId
pub async fn patient_sessions(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let mut sessions = state.repository.sessions_for_patient(&patient.id).await?;
    for session in sessions.iter_mut() {
        session.created_by = state.codec.encode(&session.created_by);
    }
    Ok(Json(sessions))
}
