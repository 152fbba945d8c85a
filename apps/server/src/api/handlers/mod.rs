//! Request handlers for API endpoints
//!
//! Handlers decode path identifiers, check the caller's reach, call into a
//! service and shape the JSON reply. Raw ids never leave this layer.

pub mod admin;
pub mod consent;
pub mod export;
pub mod gated;
pub mod import;
pub mod issuer;
pub mod metrics;
pub mod patients;
pub mod shares;

use crate::auth::Principal;
use crate::models::Patient;
use crate::state::AppState;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Decode an identifier taken from the path; failures read as absence.
pub(crate) fn decode_id(state: &AppState, encoded: &str) -> Result<String> {
    Ok(state.codec.decode(encoded)?)
}

/// Load the patient behind `encoded` and check that `principal` may act on it.
pub(crate) async fn authorized_patient(
    state: &AppState,
    principal: &Principal,
    encoded: &str,
) -> Result<Patient> {
    let patient_id = decode_id(state, encoded)?;
    let patient = state
        .repository
        .get_patient(&patient_id)
        .await?
        .ok_or_else(Error::patient_not_found)?;
    principal.ensure_patient_access(&patient)?;
    Ok(patient)
}

/// Serialize a record without its owner (`createdBy`) field.
pub(crate) fn without_owner<T: Serialize>(record: &T) -> Result<JsonValue> {
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("createdBy");
    }
    Ok(value)
}

pub(crate) fn without_owner_all<T: Serialize>(records: &[T]) -> Result<Vec<JsonValue>> {
    records.iter().map(without_owner).collect()
}

/// Patient as returned to clients: encoded id, owner encoded too.
pub(crate) fn patient_json(state: &AppState, patient: &Patient) -> Result<JsonValue> {
    let mut value = serde_json::to_value(patient)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("id".into(), state.codec.encode(&patient.id).into());
        object.insert("createdBy".into(), state.codec.encode(&patient.created_by).into());
        object.insert("version".into(), patient.version.into());
    }
    Ok(value)
}
