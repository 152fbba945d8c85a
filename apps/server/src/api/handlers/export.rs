//! FHIR export routes
//!
//! Every route here is limited to staff roles.

use super::decode_id;
use crate::auth::{AuthenticatedPrincipal, Principal};
use crate::models::Role;
use crate::services::aggregate::Category;
use crate::state::AppState;
use crate::Result;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

const EXPORT_ROLES: [Role; 2] = [Role::Admin, Role::SuperAdmin];

fn require_exporter(principal: &Principal) -> Result<()> {
    principal.require_role(&EXPORT_ROLES)
}

/// GET /eo/patient/:patientId
pub async fn patient_bundle(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    require_exporter(&principal)?;
    let patient_id = decode_id(&state, &patient_id)?;
    Ok(Json(state.export.patient_bundle(&patient_id).await?))
}

/// GET /eo/patients/:groupId
pub async fn group_bundles(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    require_exporter(&principal)?;
    Ok(Json(state.export.group_bundles(&group_id).await?))
}

async fn category_bundle(
    state: AppState,
    principal: Principal,
    group_id: String,
    category: Category,
) -> Result<impl IntoResponse> {
    require_exporter(&principal)?;
    Ok(Json(state.export.category_bundle(&group_id, category).await?))
}

/// GET /eo/drugs/:groupId
pub async fn drugs(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Medications).await
}

/// GET /eo/phenotypes/:groupId
pub async fn phenotypes(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Phenotype).await
}

/// GET /eo/feels/:groupId
pub async fn feels(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Feels).await
}

/// GET /eo/proms/:groupId
pub async fn proms(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Proms).await
}

/// GET /eo/seizures/:groupId
pub async fn seizures(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Seizures).await
}

/// GET /eo/weights/:groupId
pub async fn weights(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Weights).await
}

/// GET /eo/heights/:groupId
pub async fn heights(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    category_bundle(state, principal, group_id, Category::Heights).await
}

/// GET /eo/consent/:patientId
pub async fn consent_bundle(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    require_exporter(&principal)?;
    let patient_id = decode_id(&state, &patient_id)?;
    Ok(Json(state.export.consent_bundle(&patient_id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OnlyPatientsBody {
    pub meta: bool,
}

/// POST /eo/onlypatients/:groupId
pub async fn only_patients(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
    body: Option<Json<OnlyPatientsBody>>,
) -> Result<impl IntoResponse> {
    require_exporter(&principal)?;
    let with_meta = body.map(|Json(body)| body.meta).unwrap_or_default();
    Ok(Json(state.export.only_patients(&group_id, with_meta).await?))
}
