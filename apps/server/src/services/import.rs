//! FHIR resource import, the inverse of the bundle exporter
//!
//! Entries are applied one at a time in input order. A failing entry is
//! reported as `failed` and the batch moves on.

use crate::db::Repository;
use crate::metrics::IMPORT_ENTRIES_TOTAL;
use crate::models::fhir::parse_instant;
use crate::models::{
    new_id, Appointment, Feel, Measurement, MeasurementKind, Medication, PhenotypeEntry,
    PromAnswer, Questionnaire, Seizure,
};
use crate::services::export::{
    CHOICE_DELIMITER, FEEL_TEXT, HEIGHT_TEXT, OTHER_DELIMITER, PHENOTYPE_TEXT, SEIZURE_PREFIX,
    WEIGHT_TEXT,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Added,
    Updated,
    Skipped,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Added => "added",
            ImportStatus::Updated => "updated",
            ImportStatus::Skipped => "skipped",
            ImportStatus::Failed => "failed",
        }
    }
}

/// Outcome of one bundle entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntryReport {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub added: bool,
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

enum Applied {
    Added,
    Updated,
    Skipped(&'static str),
}

#[derive(Clone)]
pub struct ImportService {
    repository: Repository,
}

impl ImportService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Import `entries` (bundle entries or bare resources) for the patient
    /// with raw id `patient_id`.
    pub async fn import_bundle(
        &self,
        patient_id: &str,
        entries: &[JsonValue],
    ) -> Result<Vec<ImportEntryReport>> {
        if self.repository.get_patient(patient_id).await?.is_none() {
            return Err(Error::patient_not_found());
        }

        let mut report = Vec::with_capacity(entries.len());
        for entry in entries {
            let resource = entry.get("resource").unwrap_or(entry);
            let resource_type = text(resource, "/resourceType").unwrap_or("unknown").to_string();
            let id = text(resource, "/id").map(str::to_string);

            let (status, message) = match self.apply(patient_id, &resource_type, resource).await {
                Ok(Applied::Added) => (ImportStatus::Added, None),
                Ok(Applied::Updated) => (ImportStatus::Updated, None),
                Ok(Applied::Skipped(reason)) => (ImportStatus::Skipped, Some(reason.to_string())),
                Err(e) => {
                    tracing::warn!(
                        patient_id = %patient_id,
                        resource_type = %resource_type,
                        "Failed to import entry: {}",
                        e
                    );
                    (ImportStatus::Failed, Some(e.to_string()))
                }
            };

            IMPORT_ENTRIES_TOTAL
                .with_label_values(&[resource_type.as_str(), status.as_str()])
                .inc();
            report.push(ImportEntryReport {
                resource_type,
                id,
                added: matches!(status, ImportStatus::Added | ImportStatus::Updated),
                status,
                message,
            });
        }

        tracing::info!(patient_id = %patient_id, entries = report.len(), "Bundle imported");
        Ok(report)
    }

    async fn apply(&self, patient_id: &str, resource_type: &str, resource: &JsonValue) -> Result<Applied> {
        match resource_type {
            "MedicationStatement" => self.medication(patient_id, resource).await,
            "Observation" => self.observation(patient_id, resource).await,
            "QuestionnaireResponse" => self.questionnaire_response(patient_id, resource).await,
            "Appointment" => self.appointment(patient_id, resource).await,
            _ => Ok(Applied::Skipped("resource type is not imported")),
        }
    }

    async fn medication(&self, patient_id: &str, resource: &JsonValue) -> Result<Applied> {
        let drug = required(resource, "/contained/0/code/coding/0/display")?;
        let dose = text(resource, "/dosage/0/text")
            .map(str::to_string)
            .or_else(|| number(resource, "/dosage/0/doseAndRate/0/doseQuantity/value").map(|v| v.to_string()))
            .unwrap_or_default();
        let start_date = instant(resource, "/effectivePeriod/start");

        let existing = self.repository.medications(patient_id).await?;
        if existing
            .iter()
            .any(|m| m.drug.eq_ignore_ascii_case(drug) && m.start_date == start_date)
        {
            return Ok(Applied::Skipped("medication already recorded"));
        }

        self.repository
            .insert_medication(&Medication {
                id: new_id(),
                created_by: patient_id.to_string(),
                drug: drug.to_string(),
                dose,
                start_date,
                end_date: instant(resource, "/effectivePeriod/end"),
                notes: text(resource, "/note/0/text").unwrap_or_default().to_string(),
                date: instant(resource, "/dateAsserted").or_else(|| Some(Utc::now())),
            })
            .await?;
        Ok(Applied::Added)
    }

    async fn observation(&self, patient_id: &str, resource: &JsonValue) -> Result<Applied> {
        let code = required(resource, "/code/text")?;
        let effective = instant(resource, "/effectiveDateTime");

        if code == PHENOTYPE_TEXT {
            let entry = PhenotypeEntry {
                id: new_id(),
                code: required(resource, "/valueString")?.to_string(),
                name: String::new(),
                onset: text(resource, "/effectiveDateTime").map(str::to_string),
            };
            return Ok(if self.repository.add_phenotype_entry(patient_id, entry).await? {
                Applied::Added
            } else {
                Applied::Skipped("phenotype already recorded")
            });
        }

        if let Some(seizure_type) = code.strip_prefix(SEIZURE_PREFIX) {
            self.repository
                .insert_seizure(&Seizure {
                    id: new_id(),
                    created_by: patient_id.to_string(),
                    seizure_type: seizure_type.to_string(),
                    duration: number(resource, "/valueQuantity/value").unwrap_or_default(),
                    start: effective,
                    notes: text(resource, "/note/0/text").unwrap_or_default().to_string(),
                    date: Some(Utc::now()),
                })
                .await?;
            return Ok(Applied::Added);
        }

        match code {
            FEEL_TEXT => {
                let score = required_number(resource, "/valueQuantity/value")?.round() as i32;
                self.repository
                    .insert_feel(&Feel {
                        id: new_id(),
                        created_by: patient_id.to_string(),
                        a1: score,
                        a2: score,
                        a3: score,
                        note: String::new(),
                        date: effective.or_else(|| Some(Utc::now())),
                    })
                    .await?;
                Ok(Applied::Added)
            }
            WEIGHT_TEXT | HEIGHT_TEXT => {
                let kind = if code == WEIGHT_TEXT {
                    MeasurementKind::Weight
                } else {
                    MeasurementKind::Height
                };
                self.repository
                    .insert_measurement(
                        kind,
                        &Measurement {
                            id: new_id(),
                            created_by: patient_id.to_string(),
                            value: required_number(resource, "/valueQuantity/value")?,
                            date: effective.or_else(|| Some(Utc::now())),
                        },
                    )
                    .await?;
                Ok(Applied::Added)
            }
            _ => Ok(Applied::Skipped("observation kind is not imported")),
        }
    }

    async fn questionnaire_response(&self, patient_id: &str, resource: &JsonValue) -> Result<Applied> {
        let questionnaire_id = text(resource, "/questionnaire")
            .map(|reference| reference.trim_start_matches("Questionnaire/"))
            .or_else(|| text(resource, "/id"))
            .ok_or_else(|| Error::Validation("questionnaire id is missing".to_string()))?
            .to_string();
        let items = resource
            .get("item")
            .and_then(JsonValue::as_array)
            .filter(|items| !items.is_empty());
        let Some(items) = items else {
            return Ok(Applied::Skipped("no answers"));
        };

        let definition = self.repository.get_questionnaire(&questionnaire_id).await?;
        // Convert every item before writing so a bad item leaves no partial answers.
        let answers = items
            .iter()
            .map(|item| {
                let link_id = required(item, "/linkId")?;
                let value = text(item, "/answer/0/valueString").unwrap_or_default();
                let (data, other) = parse_answer(definition.as_ref(), link_id, value);
                Ok(PromAnswer {
                    id: new_id(),
                    created_by: patient_id.to_string(),
                    id_questionnaire: questionnaire_id.clone(),
                    id_prom: link_id.to_string(),
                    data,
                    other,
                    date: Some(Utc::now()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut any_updated = false;
        for answer in answers {
            any_updated |= self.repository.upsert_prom_answer(answer).await?;
        }

        Ok(if any_updated { Applied::Updated } else { Applied::Added })
    }

    async fn appointment(&self, patient_id: &str, resource: &JsonValue) -> Result<Applied> {
        self.repository
            .insert_appointment(&Appointment {
                id: new_id(),
                created_by: patient_id.to_string(),
                title: text(resource, "/description").unwrap_or_default().to_string(),
                start: instant(resource, "/start"),
                end: instant(resource, "/end"),
                notes: text(resource, "/comment").unwrap_or_default().to_string(),
                date: instant(resource, "/created").or_else(|| Some(Utc::now())),
            })
            .await?;
        Ok(Applied::Added)
    }
}

/// Split a rendered answer back into stored data and free text.
///
/// `ChoiceSet` items are mapped from labels to `{ optionValue: true }`. The
/// exporter renders the free-text option last, so its text runs to the end of
/// the value and may itself contain the label delimiter. Any other item
/// splits once on the "other" delimiter.
pub fn parse_answer(definition: Option<&Questionnaire>, link_id: &str, value: &str) -> (JsonValue, String) {
    let item = definition.and_then(|q| q.item(link_id));

    if let Some(item) = item.filter(|item| item.is_choice_set()) {
        let mut selected = Map::new();
        let other_option = item
            .other
            .as_deref()
            .and_then(|other| item.answers.iter().find(|option| option.value == other));

        let (labels, other) = match other_option.and_then(|option| split_other(value, &option.text)) {
            Some((labels, free_text)) => {
                if let Some(option) = other_option {
                    selected.insert(option.value.clone(), JsonValue::Bool(true));
                }
                (labels, free_text.to_string())
            }
            None => (value, String::new()),
        };

        for label in labels.split(CHOICE_DELIMITER).filter(|l| !l.is_empty()) {
            if let Some(option) = item.answers.iter().find(|option| option.text == label) {
                selected.insert(option.value.clone(), JsonValue::Bool(true));
            }
        }
        return (JsonValue::Object(selected), other);
    }

    match value.split_once(OTHER_DELIMITER) {
        Some((data, other)) => (JsonValue::String(data.to_string()), other.to_string()),
        None => (JsonValue::String(value.to_string()), String::new()),
    }
}

/// Find `<label>: ` at the start of `value` or after a label delimiter and
/// return the labels before it and the free text after it.
fn split_other<'a>(value: &'a str, label: &str) -> Option<(&'a str, &'a str)> {
    let marker = format!("{label}{OTHER_DELIMITER}");
    if let Some(free_text) = value.strip_prefix(marker.as_str()) {
        return Some(("", free_text));
    }
    let marker = format!("{CHOICE_DELIMITER}{marker}");
    value
        .find(marker.as_str())
        .map(|pos| (&value[..pos], &value[pos + marker.len()..]))
}

fn text<'a>(value: &'a JsonValue, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(JsonValue::as_str)
}

fn required<'a>(value: &'a JsonValue, pointer: &str) -> Result<&'a str> {
    text(value, pointer)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation(format!("{} is missing", pointer.trim_start_matches('/'))))
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(value: &JsonValue, pointer: &str) -> Option<f64> {
    match value.pointer(pointer)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn required_number(value: &JsonValue, pointer: &str) -> Result<f64> {
    number(value, pointer)
        .ok_or_else(|| Error::Validation(format!("{} is not a number", pointer.trim_start_matches('/'))))
}

fn instant(value: &JsonValue, pointer: &str) -> Option<DateTime<Utc>> {
    text(value, pointer).and_then(parse_instant)
}
