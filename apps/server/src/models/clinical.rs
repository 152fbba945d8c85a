//! Clinical sub-records. Each is owned by exactly one patient through
//! `created_by` (the patient's raw id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Medication {
    pub id: String,
    pub created_by: String,
    pub drug: String,
    pub dose: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub date: Option<DateTime<Utc>>,
}

impl Medication {
    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }
}

/// A single phenotype term (HPO code) on the patient's phenotype document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhenotypeEntry {
    pub id: String,
    pub code: String,
    pub name: String,
    pub onset: Option<String>,
}

/// One phenotype document per patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Phenotype {
    pub id: String,
    pub created_by: String,
    pub date: Option<DateTime<Utc>>,
    pub data: Vec<PhenotypeEntry>,
}

/// Mood entry scored on three axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Feel {
    pub id: String,
    pub created_by: String,
    pub a1: i32,
    pub a2: i32,
    pub a3: i32,
    pub note: String,
    pub date: Option<DateTime<Utc>>,
}

/// Answer to one questionnaire item.
///
/// `data` is a string for free-text and single-choice items, and an object of
/// `{ optionValue: bool }` for `ChoiceSet` items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromAnswer {
    pub id: String,
    pub created_by: String,
    pub id_questionnaire: String,
    pub id_prom: String,
    pub data: JsonValue,
    pub other: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seizure {
    pub id: String,
    pub created_by: String,
    #[serde(rename = "type")]
    pub seizure_type: String,
    /// Duration in seconds.
    pub duration: f64,
    pub start: Option<DateTime<Utc>>,
    pub notes: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    Weight,
    Height,
}

/// Weight (kg) or height (cm) reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Measurement {
    pub id: String,
    pub created_by: String,
    pub value: f64,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appointment {
    pub id: String,
    pub created_by: String,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub notes: String,
    pub date: Option<DateTime<Utc>>,
}
