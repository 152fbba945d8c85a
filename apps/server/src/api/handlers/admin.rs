//! Organization and questionnaire catalog administration

use crate::auth::AuthenticatedPrincipal;
use crate::models::{Group, Questionnaire, Role};
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

/// PUT /group/:groupId
pub async fn put_group(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
    Json(mut group): Json<Group>,
) -> Result<impl IntoResponse> {
    principal.require_role(&[Role::SuperAdmin])?;
    group.id = group_id;
    state.repository.save_group(&group).await?;
    tracing::info!(group_id = %group.id, drugs = group.drugs.len(), "Group saved");
    Ok(Json(group))
}

/// GET /group/:groupId
pub async fn get_group(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    let group = state
        .repository
        .get_group(&group_id)
        .await?
        .ok_or_else(|| Error::NotFound("Group not found".to_string()))?;
    Ok(Json(group))
}

/// PUT /resources/questionnaire/:questionnaireId
pub async fn put_questionnaire(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(questionnaire_id): Path<String>,
    Json(mut questionnaire): Json<Questionnaire>,
) -> Result<impl IntoResponse> {
    principal.require_role(&[Role::Admin, Role::SuperAdmin])?;
    questionnaire.id = questionnaire_id;
    state.repository.save_questionnaire(&questionnaire).await?;
    Ok(Json(questionnaire))
}

/// GET /resources/questionnaire/:questionnaireId
pub async fn get_questionnaire(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path(questionnaire_id): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .repository
        .get_questionnaire(&questionnaire_id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound("Questionnaire not found".to_string()))
}
