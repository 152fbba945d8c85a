//! Organization consent routes

use super::authorized_patient;
use crate::auth::AuthenticatedPrincipal;
use crate::services::consent::ConsentOutcome;
use crate::state::AppState;
use crate::Result;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ConsentBody {
    pub consentgroup: String,
}

/// GET /patient/consentgroup/:patientId
pub async fn get_consent(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    Ok(Json(json!({ "consent": patient.consentgroup })))
}

/// PUT /patient/consentgroup/:patientId
pub async fn set_consent(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
    Json(body): Json<ConsentBody>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let reply = match state.consent.change(&patient.id, &body.consentgroup).await? {
        ConsentOutcome::Issued { session, .. } => json!({
            "message": "qrgenerated",
            "data": session.data,
        }),
        ConsentOutcome::Changed { patient } => json!({
            "message": "consent changed",
            "consent": patient.consentgroup,
        }),
    };
    Ok(Json(reply))
}
