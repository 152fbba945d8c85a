//! Bulk resource import

use super::authorized_patient;
use crate::auth::AuthenticatedPrincipal;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value as JsonValue};

/// POST /massiveresources/:patientId
///
/// Accepts an array of bundle entries (or bare resources), or a whole
/// `Bundle` whose `entry` array is imported.
pub async fn import_resources(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(patient_id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let patient = authorized_patient(&state, &principal, &patient_id).await?;
    let entries = match &body {
        JsonValue::Array(entries) => entries.as_slice(),
        JsonValue::Object(_) => body
            .get("entry")
            .and_then(JsonValue::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Validation("expected an array of bundle entries".to_string()))?,
        _ => {
            return Err(Error::Validation(
                "expected an array of bundle entries".to_string(),
            ))
        }
    };

    let report = state.import.import_bundle(&patient.id, entries).await?;
    Ok(Json(json!({
        "message": "resources imported",
        "eventdb": report,
    })))
}
