//! Collaborator reads behind the access gates
//!
//! The gate middleware has already resolved the patient and checked the
//! credential; these handlers only apply the optional date window.

use super::{without_owner, without_owner_all};
use crate::api::middleware::GatedPatient;
use crate::state::AppState;
use crate::Result;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

/// Optional inclusive window on the record date. The credential fields of the
/// body are consumed by the gate and ignored here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn contains(&self, date: Option<DateTime<Utc>>) -> bool {
        match date {
            Some(date) => {
                self.start.map_or(true, |start| date >= start)
                    && self.end.map_or(true, |end| date <= end)
            }
            None => self.start.is_none() && self.end.is_none(),
        }
    }
}

fn window(body: Option<Json<DateWindow>>) -> DateWindow {
    body.map(|Json(window)| window).unwrap_or_default()
}

pub async fn phenotypes(
    State(state): State<AppState>,
    Extension(GatedPatient(patient)): Extension<GatedPatient>,
) -> Result<impl IntoResponse> {
    let phenotype = state.repository.phenotype(&patient.id).await?;
    let body = match phenotype {
        Some(phenotype) => without_owner(&phenotype)?,
        None => json!({ "data": [] }),
    };
    Ok(Json(body))
}

pub async fn seizures_dates(
    State(state): State<AppState>,
    Extension(GatedPatient(patient)): Extension<GatedPatient>,
    body: Option<Json<DateWindow>>,
) -> Result<impl IntoResponse> {
    let window = window(body);
    let seizures: Vec<_> = state
        .repository
        .seizures(&patient.id)
        .await?
        .into_iter()
        .filter(|s| window.contains(s.start))
        .collect();
    Ok(Json(JsonValue::Array(without_owner_all(&seizures)?)))
}

pub async fn medications_dates(
    State(state): State<AppState>,
    Extension(GatedPatient(patient)): Extension<GatedPatient>,
    body: Option<Json<DateWindow>>,
) -> Result<impl IntoResponse> {
    let window = window(body);
    let medications: Vec<_> = state
        .repository
        .medications(&patient.id)
        .await?
        .into_iter()
        .filter(|m| window.contains(m.start_date))
        .collect();
    Ok(Json(JsonValue::Array(without_owner_all(&medications)?)))
}

pub async fn feels_dates(
    State(state): State<AppState>,
    Extension(GatedPatient(patient)): Extension<GatedPatient>,
    body: Option<Json<DateWindow>>,
) -> Result<impl IntoResponse> {
    let window = window(body);
    let feels: Vec<_> = state
        .repository
        .feels(&patient.id)
        .await?
        .into_iter()
        .filter(|f| window.contains(f.date))
        .collect();
    Ok(Json(JsonValue::Array(without_owner_all(&feels)?)))
}
