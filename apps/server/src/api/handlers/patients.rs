//! Patient registration and lookup

use super::{authorized_patient, patient_json};
use crate::auth::AuthenticatedPrincipal;
use crate::models::{new_id, ConsentState, Patient, Role};
use crate::state::AppState;
use crate::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub patient_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub phone1: String,
    #[serde(default)]
    pub phone2: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub group: Option<String>,
}

/// POST /patients
pub async fn create_patient(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(body): Json<NewPatient>,
) -> Result<impl IntoResponse> {
    principal.require_role(&[Role::User])?;
    let patient = state
        .repository
        .insert_patient(Patient {
            id: new_id(),
            created_by: principal.user_id.clone(),
            patient_name: body.patient_name,
            surname: body.surname,
            birth_date: body.birth_date,
            gender: body.gender,
            phone1: body.phone1,
            phone2: body.phone2,
            street: body.street,
            postal_code: body.postal_code,
            city: body.city,
            province: body.province,
            country: body.country,
            group: body.group,
            consentgroup: ConsentState::False,
            last_access: Some(Utc::now()),
            ..Default::default()
        })
        .await?;

    tracing::info!(user_id = %principal.user_id, "Patient created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "patientId": state.codec.encode(&patient.id),
            "patient": patient_json(&state, &patient)?,
        })),
    ))
}

/// GET /patients/:patientId
pub async fn get_patient(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    Ok(Json(patient_json(&state, &patient)?))
}
