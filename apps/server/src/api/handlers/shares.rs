//! Share configuration routes
//!
//! Reads return the patient version as an ETag; writes honor `If-Match` and
//! answer 412 when it is stale. The general share is posted as the bare share
//! object and custom shares as the bare array; the individual share body also
//! carries acceptance fields, so it may name its `version` inline.

use super::authorized_patient;
use crate::api::headers::{etag_header, expected_version, extract_if_match};
use crate::auth::AuthenticatedPrincipal;
use crate::models::{CustomShare, GeneralShare, IndividualShare};
use crate::services::sharing::{IndividualShareOutcome, IndividualShareUpdate};
use crate::state::AppState;
use crate::Result;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualShareBody {
    pub individual_share: Vec<IndividualShare>,
    #[serde(default)]
    pub index_updated: Option<usize>,
    #[serde(default)]
    pub update_status: bool,
    #[serde(default)]
    pub version: Option<i64>,
}

pub async fn get_general_share(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    Ok((
        etag_header(patient.version),
        Json(json!({
            "generalShare": patient.general_share,
            "version": patient.version,
        })),
    ))
}

pub async fn set_general_share(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
    headers: HeaderMap,
    Json(share): Json<GeneralShare>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let patient = state
        .sharing
        .set_general_share(&patient.id, share, extract_if_match(&headers))
        .await?;
    Ok((
        etag_header(patient.version),
        Json(json!({
            "message": "general share updated",
            "generalShare": patient.general_share,
            "version": patient.version,
        })),
    ))
}

pub async fn get_custom_share(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    Ok((
        etag_header(patient.version),
        Json(json!({
            "customShare": patient.custom_share,
            "version": patient.version,
        })),
    ))
}

pub async fn set_custom_share(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
    headers: HeaderMap,
    Json(shares): Json<Vec<CustomShare>>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let patient = state
        .sharing
        .set_custom_shares(&patient.id, shares, extract_if_match(&headers))
        .await?;
    Ok((
        etag_header(patient.version),
        Json(json!({
            "message": "custom share updated",
            "customShare": patient.custom_share,
            "version": patient.version,
        })),
    ))
}

pub async fn get_individual_share(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let (views, version) = state.sharing.individual_shares(&patient.id).await?;
    Ok((
        etag_header(version),
        Json(json!({ "individualShare": views, "version": version })),
    ))
}

pub async fn set_individual_share(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<IndividualShareBody>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let update = IndividualShareUpdate {
        shares: body.individual_share,
        index_updated: body.index_updated,
        update_status: body.update_status,
        expected_version: expected_version(&headers, body.version),
    };

    let response = match state.sharing.set_individual_shares(&patient.id, update).await? {
        IndividualShareOutcome::Issued { patient, session } => (
            etag_header(patient.version),
            Json(json!({
                "message": "qrgenerated",
                "data": session.data,
                "version": patient.version,
            })),
        ),
        IndividualShareOutcome::Updated(patient) => (
            etag_header(patient.version),
            Json(json!({
                "message": "individual share updated",
                "version": patient.version,
            })),
        ),
    };
    Ok(response)
}
