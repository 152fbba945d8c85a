//! FHIR bundle export
//!
//! [`BundleExporter`] is a pure mapping from aggregated records to FHIR
//! resources. [`ExportService`] wires it to the repository and aggregator for
//! the single-patient, group and per-category views.

use crate::codec::IdCodec;
use crate::db::Repository;
use crate::metrics::EXPORT_DURATION_SECONDS;
use crate::models::fhir::format_instant;
use crate::models::{
    Appointment, Bundle, BundleEntry, ConsentState, Feel, Group, Measurement, Medication,
    Patient, PhenotypeEntry, PromAnswer, Questionnaire, QuestionnaireItem, Seizure,
};
use crate::services::aggregate::{Aggregator, Category, PatientRecords};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

const SNOMED: &str = "http://snomed.info/sct";
const SNOMED_DRUGS: &str = "http://snomed.info/sct/731000124108";
const LOINC: &str = "http://loinc.org";
const UCUM: &str = "http://unitsofmeasure.org";
const OBSERVATION_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/observation-category";

/// Separator between an answer and its free-text "other" part.
pub const OTHER_DELIMITER: &str = ": ";
/// Separator between selected `ChoiceSet` labels.
pub const CHOICE_DELIMITER: &str = ", ";
/// `code.text` prefix of seizure observations.
pub const SEIZURE_PREFIX: &str = "Seizure - ";

pub const PHENOTYPE_TEXT: &str = "Phenotype";
pub const FEEL_TEXT: &str = "Feel";
pub const WEIGHT_TEXT: &str = "Weight";
pub const HEIGHT_TEXT: &str = "Body height";

/// Maps patient records to FHIR resources. Patient references always carry
/// the encoded id.
#[derive(Clone)]
pub struct BundleExporter {
    codec: Arc<IdCodec>,
}

impl BundleExporter {
    pub fn new(codec: Arc<IdCodec>) -> Self {
        Self { codec }
    }

    /// Full bundle: Patient, Condition, then every loaded category in order.
    pub fn to_bundle(
        &self,
        patient: &Patient,
        records: &PatientRecords,
        group: Option<&Group>,
        questionnaires: &[Questionnaire],
    ) -> Bundle {
        let mut entry = vec![
            BundleEntry::new(self.patient_resource(patient)),
            BundleEntry::new(self.condition(patient, group)),
        ];
        for category in Category::ALL {
            entry.extend(self.category_entries(category, patient, records, group, questionnaires));
        }
        Bundle::collection(entry)
    }

    /// Entries of one category only.
    pub fn category_entries(
        &self,
        category: Category,
        patient: &Patient,
        records: &PatientRecords,
        group: Option<&Group>,
        questionnaires: &[Questionnaire],
    ) -> Vec<BundleEntry> {
        let resources: Vec<JsonValue> = match category {
            Category::Medications => records
                .medications
                .items()
                .iter()
                .map(|m| self.medication_statement(patient, m, group))
                .collect(),
            Category::Phenotype => records
                .phenotype
                .items()
                .iter()
                .map(|p| self.phenotype_observation(patient, p))
                .collect(),
            Category::Feels => records
                .feels
                .items()
                .iter()
                .map(|f| self.feel_observation(patient, f))
                .collect(),
            Category::Proms => {
                self.questionnaire_responses(patient, records.proms.items(), questionnaires)
            }
            Category::Seizures => records
                .seizures
                .items()
                .iter()
                .map(|s| self.seizure_observation(patient, s))
                .collect(),
            Category::Weights => records
                .weights
                .items()
                .iter()
                .map(|w| self.weight_observation(patient, w))
                .collect(),
            Category::Heights => records
                .heights
                .items()
                .iter()
                .map(|h| self.height_observation(patient, h))
                .collect(),
            Category::Consent => records
                .consent
                .items()
                .iter()
                .filter(|state| **state == ConsentState::True)
                .map(|_| self.consent(patient))
                .collect(),
            Category::Appointments => records
                .appointments
                .items()
                .iter()
                .map(|a| self.appointment(patient, a))
                .collect(),
        };
        resources.into_iter().map(BundleEntry::new).collect()
    }

    fn patient_reference(&self, patient: &Patient) -> String {
        format!("Patient/{}", self.codec.encode(&patient.id))
    }

    pub fn patient_resource(&self, patient: &Patient) -> JsonValue {
        let telecom: Vec<JsonValue> = [&patient.phone1, &patient.phone2]
            .into_iter()
            .filter(|phone| !phone.is_empty())
            .map(|phone| json!({ "system": "phone", "value": phone, "use": "mobile" }))
            .collect();

        prune(json!({
            "resourceType": "Patient",
            "id": self.codec.encode(&patient.id),
            "active": true,
            "name": [{
                "use": "usual",
                "given": [patient.patient_name],
                "family": non_empty(&patient.surname),
            }],
            "telecom": telecom,
            "gender": non_empty(&patient.gender),
            "birthDate": patient.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "address": [{
                "line": [patient.street],
                "city": patient.city,
                "state": patient.province,
                "postalCode": patient.postal_code,
                "country": patient.country,
            }],
        }))
    }

    /// The organization's condition. Emitted for every patient; without a
    /// group the id is `none` and the text empty.
    pub fn condition(&self, patient: &Patient, group: Option<&Group>) -> JsonValue {
        let (id, name) = group
            .map(|g| (g.id.as_str(), g.name.as_str()))
            .unwrap_or(("none", ""));
        json!({
            "resourceType": "Condition",
            "id": id,
            "meta": {
                "profile": ["http://hl7.org/fhir/us/core/StructureDefinition/us-core-condition"]
            },
            "verificationStatus": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/condition-ver-status",
                    "code": "confirmed",
                    "display": "Confirmed"
                }],
                "text": "Confirmed"
            },
            "category": [{
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/condition-category",
                    "code": "encounter-diagnosis",
                    "display": "Encounter Diagnosis"
                }],
                "text": "Encounter Diagnosis"
            }],
            "code": { "coding": [], "text": name },
            "subject": { "reference": self.patient_reference(patient), "type": "Patient" }
        })
    }

    pub fn medication_statement(
        &self,
        patient: &Patient,
        medication: &Medication,
        group: Option<&Group>,
    ) -> JsonValue {
        let drug = group.and_then(|g| g.find_drug(&medication.drug));
        let drug_id = drug.map(|d| d.id.as_str()).unwrap_or_default();
        let drug_code = drug.map(|d| d.snomed.as_str()).unwrap_or_default();
        let status = if medication.is_active() { "active" } else { "stopped" };

        let mut dosage = json!({
            "sequence": 1,
            "text": medication.dose,
            "asNeededBoolean": false,
            "route": {
                "coding": [{ "system": SNOMED, "code": "260548002", "display": "Oral" }]
            },
        });
        if let Ok(value) = medication.dose.trim().parse::<f64>() {
            dosage["doseAndRate"] = json!([{
                "type": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/dose-rate-type",
                        "code": "ordered",
                        "display": "Ordered"
                    }]
                },
                "doseQuantity": { "value": value, "unit": "mg", "system": UCUM, "code": "mg" }
            }]);
        }

        prune(json!({
            "resourceType": "MedicationStatement",
            "id": medication.id,
            "status": status,
            "contained": [{
                "resourceType": "Medication",
                "id": drug_id,
                "code": {
                    "coding": [{
                        "system": SNOMED_DRUGS,
                        "code": drug_code,
                        "display": medication.drug
                    }]
                }
            }],
            "medicationReference": { "reference": format!("#{}", drug_id) },
            "subject": {
                "reference": self.patient_reference(patient),
                "display": patient.patient_name
            },
            "effectivePeriod": {
                "start": instant(&medication.start_date),
                "end": instant(&medication.end_date),
            },
            "dateAsserted": instant(&medication.date),
            "note": [{ "text": medication.notes }],
            "dosage": [dosage],
        }))
    }

    pub fn phenotype_observation(&self, patient: &Patient, entry: &PhenotypeEntry) -> JsonValue {
        prune(json!({
            "resourceType": "Observation",
            "id": entry.id,
            "status": "final",
            "code": { "text": PHENOTYPE_TEXT },
            "subject": { "reference": self.patient_reference(patient) },
            "effectiveDateTime": entry.onset,
            "valueString": entry.code,
        }))
    }

    pub fn feel_observation(&self, patient: &Patient, feel: &Feel) -> JsonValue {
        prune(json!({
            "resourceType": "Observation",
            "id": feel.id,
            "status": "final",
            "code": { "text": FEEL_TEXT },
            "subject": { "reference": self.patient_reference(patient) },
            "effectiveDateTime": instant(&feel.date),
            "valueQuantity": { "value": feel_mean(feel), "unit": "AVG" },
        }))
    }

    /// One `QuestionnaireResponse` per questionnaire id, items in answer order.
    /// Answers whose item is not in the definition are left out.
    pub fn questionnaire_responses(
        &self,
        patient: &Patient,
        answers: &[PromAnswer],
        questionnaires: &[Questionnaire],
    ) -> Vec<JsonValue> {
        let mut grouped: BTreeMap<&str, Vec<&PromAnswer>> = BTreeMap::new();
        for answer in answers {
            grouped
                .entry(answer.id_questionnaire.as_str())
                .or_default()
                .push(answer);
        }

        grouped
            .into_iter()
            .map(|(questionnaire_id, answers)| {
                let definition = questionnaires.iter().find(|q| q.id == questionnaire_id);
                let items: Vec<JsonValue> = answers
                    .into_iter()
                    .filter_map(|answer| {
                        let item = definition?.item(&answer.id_prom)?;
                        Some(json!({
                            "linkId": answer.id_prom,
                            "text": item.text,
                            "answer": [{ "valueString": render_answer(item, answer) }],
                        }))
                    })
                    .collect();

                json!({
                    "resourceType": "QuestionnaireResponse",
                    "id": questionnaire_id,
                    "questionnaire": format!("Questionnaire/{}", questionnaire_id),
                    "status": "completed",
                    "subject": {
                        "reference": self.patient_reference(patient),
                        "display": patient.patient_name
                    },
                    "item": items,
                })
            })
            .collect()
    }

    pub fn seizure_observation(&self, patient: &Patient, seizure: &Seizure) -> JsonValue {
        prune(json!({
            "resourceType": "Observation",
            "id": seizure.id,
            "status": "final",
            "code": {
                "coding": [{ "system": SNOMED, "code": "91175000", "display": "Seizure" }],
                "text": format!("{}{}", SEIZURE_PREFIX, seizure.seizure_type),
            },
            "subject": { "reference": self.patient_reference(patient) },
            "effectiveDateTime": instant(&seizure.start),
            "valueQuantity": { "value": seizure.duration, "unit": "Seconds", "system": UCUM, "code": "s" },
            "note": non_empty(&seizure.notes).map(|text| json!([{ "text": text }])),
        }))
    }

    pub fn weight_observation(&self, patient: &Patient, weight: &Measurement) -> JsonValue {
        let coding = json!([
            { "system": LOINC, "code": "29463-7", "display": "Body Weight" },
            { "system": LOINC, "code": "3141-9", "display": "Body weight Measured" },
            { "system": SNOMED, "code": "27113001", "display": "Body weight" }
        ]);
        self.vital_sign(patient, weight, coding, WEIGHT_TEXT, "kg")
    }

    pub fn height_observation(&self, patient: &Patient, height: &Measurement) -> JsonValue {
        let coding = json!([{ "system": LOINC, "code": "8302-2", "display": "Body height" }]);
        self.vital_sign(patient, height, coding, HEIGHT_TEXT, "cm")
    }

    fn vital_sign(
        &self,
        patient: &Patient,
        measurement: &Measurement,
        coding: JsonValue,
        text: &str,
        unit: &str,
    ) -> JsonValue {
        prune(json!({
            "resourceType": "Observation",
            "id": measurement.id,
            "status": "final",
            "category": [{
                "coding": [{
                    "system": OBSERVATION_CATEGORY,
                    "code": "vital-signs",
                    "display": "Vital Signs"
                }]
            }],
            "code": { "coding": coding, "text": text },
            "subject": { "reference": self.patient_reference(patient) },
            "effectiveDateTime": instant(&measurement.date),
            "valueQuantity": { "value": measurement.value, "unit": unit, "system": UCUM, "code": unit },
        }))
    }

    pub fn consent(&self, patient: &Patient) -> JsonValue {
        let encoded = self.codec.encode(&patient.id);
        let organization: Vec<JsonValue> = patient
            .group
            .iter()
            .map(|group| json!({ "reference": format!("Organization/{}", group) }))
            .collect();

        prune(json!({
            "resourceType": "Consent",
            "id": encoded,
            "status": "active",
            "scope": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/consentscope",
                    "code": "patient-privacy"
                }]
            },
            "category": [{ "coding": [{ "system": LOINC, "code": "59284-0" }] }],
            "patient": {
                "reference": format!("Patient/{}", encoded),
                "display": patient.patient_name
            },
            "dateTime": instant(&patient.last_access),
            "organization": organization,
            "sourceAttachment": { "title": "Consent to share clinical data with the patient organization." },
            "policyRule": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/v3-ActCode",
                    "code": "OPTIN"
                }]
            },
            "provision": { "period": { "start": instant(&patient.last_access) } },
        }))
    }

    pub fn appointment(&self, patient: &Patient, appointment: &Appointment) -> JsonValue {
        prune(json!({
            "resourceType": "Appointment",
            "id": appointment.id,
            "status": "proposed",
            "description": appointment.title,
            "start": instant(&appointment.start),
            "end": instant(&appointment.end),
            "created": instant(&appointment.date),
            "comment": non_empty(&appointment.notes),
            "participant": [{
                "actor": {
                    "reference": self.patient_reference(patient),
                    "display": patient.patient_name
                },
                "required": "required",
                "status": "accepted"
            }],
        }))
    }
}

/// Mean of the three axes, rounded to two decimals.
pub fn feel_mean(feel: &Feel) -> f64 {
    let sum = Decimal::from(feel.a1) + Decimal::from(feel.a2) + Decimal::from(feel.a3);
    (sum / Decimal::from(3))
        .round_dp(2)
        .to_f64()
        .unwrap_or_default()
}

/// Display text of a PROM answer.
///
/// Plain items render their value with the free text appended. `ChoiceSet`
/// items render the labels of selected options, the "other" option carrying
/// the free text.
pub fn render_answer(item: &QuestionnaireItem, answer: &PromAnswer) -> String {
    if item.is_choice_set() {
        let selected = match &answer.data {
            JsonValue::Object(options) => options,
            _ => return String::new(),
        };
        let is_selected =
            |value: &str| selected.get(value).and_then(JsonValue::as_bool) == Some(true);
        let is_other = |value: &str| item.other.as_deref() == Some(value);

        // Free text goes last so it can run to the end of the rendered value.
        let mut labels: Vec<String> = item
            .answers
            .iter()
            .filter(|option| is_selected(&option.value) && !is_other(&option.value))
            .map(|option| option.text.clone())
            .collect();
        if let Some(option) = item
            .answers
            .iter()
            .find(|option| is_selected(&option.value) && is_other(&option.value))
        {
            labels.push(if answer.other.is_empty() {
                option.text.clone()
            } else {
                format!("{}{}{}", option.text, OTHER_DELIMITER, answer.other)
            });
        }
        return labels.join(CHOICE_DELIMITER);
    }

    let value = match &answer.data {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    };
    if answer.other.is_empty() {
        value
    } else {
        format!("{}{}{}", value, OTHER_DELIMITER, answer.other)
    }
}

fn instant(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(format_instant)
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// Drop null members, recursively.
fn prune(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune(v)))
                .collect::<Map<_, _>>(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(prune).collect()),
        other => other,
    }
}

/// Export of one patient within a group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientExport {
    pub patient_id: String,
    pub result: Bundle,
}

/// Basic view of a consenting patient, optionally with record counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub patient_id: String,
    pub result: Bundle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<&'static str, usize>>,
}

#[derive(Clone)]
pub struct ExportService {
    repository: Repository,
    aggregator: Aggregator,
    exporter: BundleExporter,
}

impl ExportService {
    pub fn new(repository: Repository, aggregator: Aggregator, codec: Arc<IdCodec>) -> Self {
        Self {
            repository,
            aggregator,
            exporter: BundleExporter::new(codec),
        }
    }

    pub fn exporter(&self) -> &BundleExporter {
        &self.exporter
    }

    /// Group and questionnaire definitions needed to render a patient.
    async fn context(&self, group_id: Option<&str>) -> Result<(Option<Group>, Vec<Questionnaire>)> {
        let Some(group_id) = group_id else {
            return Ok((None, Vec::new()));
        };
        let group = self.repository.get_group(group_id).await?;
        let questionnaires = match &group {
            Some(group) => self.repository.questionnaires(&group.questionnaires).await?,
            None => Vec::new(),
        };
        Ok((group, questionnaires))
    }

    async fn require_group(&self, group_id: &str) -> Result<(Group, Vec<Questionnaire>)> {
        match self.context(Some(group_id)).await? {
            (Some(group), questionnaires) => Ok((group, questionnaires)),
            (None, _) => Err(Error::NotFound("Group not found".to_string())),
        }
    }

    /// Full bundle for one patient, whatever the consent state.
    pub async fn patient_bundle(&self, patient_id: &str) -> Result<PatientExport> {
        let timer = Instant::now();
        let patient = self
            .repository
            .get_patient(patient_id)
            .await?
            .ok_or_else(Error::patient_not_found)?;
        let (group, questionnaires) = self.context(patient.group.as_deref()).await?;
        let records = self.aggregator.aggregate(&patient).await;

        let result = self
            .exporter
            .to_bundle(&patient, &records, group.as_ref(), &questionnaires);
        observe("patient", timer);
        Ok(PatientExport {
            patient_id: self.exporter.codec.encode(&patient.id),
            result,
        })
    }

    /// Full bundles for every consenting patient of a group.
    pub async fn group_bundles(&self, group_id: &str) -> Result<Vec<PatientExport>> {
        let timer = Instant::now();
        let (group, questionnaires) = self.require_group(group_id).await?;
        let rows = self.aggregator.aggregate_group(group_id, &Category::ALL).await?;

        let exports = rows
            .iter()
            .map(|(patient, records)| PatientExport {
                patient_id: self.exporter.codec.encode(&patient.id),
                result: self
                    .exporter
                    .to_bundle(patient, records, Some(&group), &questionnaires),
            })
            .collect();
        observe("group", timer);
        Ok(exports)
    }

    /// One bundle holding `category` for every consenting patient of a group.
    pub async fn category_bundle(&self, group_id: &str, category: Category) -> Result<Bundle> {
        let timer = Instant::now();
        let (group, questionnaires) = self.require_group(group_id).await?;
        let rows = self.aggregator.aggregate_group(group_id, &[category]).await?;

        let entry = rows
            .iter()
            .flat_map(|(patient, records)| {
                self.exporter
                    .category_entries(category, patient, records, Some(&group), &questionnaires)
            })
            .collect();
        observe(category.as_str(), timer);
        Ok(Bundle::collection(entry))
    }

    /// Bundle with the patient's Consent when consent is active, empty otherwise.
    pub async fn consent_bundle(&self, patient_id: &str) -> Result<Bundle> {
        let patient = self
            .repository
            .get_patient(patient_id)
            .await?
            .ok_or_else(Error::patient_not_found)?;
        let entry = match patient.consentgroup {
            ConsentState::True => vec![BundleEntry::new(self.exporter.consent(&patient))],
            _ => Vec::new(),
        };
        Ok(Bundle::collection(entry))
    }

    /// Patient resources of the consenting members of a group, with record
    /// counts per category when `with_meta` is set.
    pub async fn only_patients(&self, group_id: &str, with_meta: bool) -> Result<Vec<PatientSummary>> {
        self.require_group(group_id).await?;
        let categories: &[Category] = if with_meta {
            &[
                Category::Medications,
                Category::Phenotype,
                Category::Feels,
                Category::Proms,
                Category::Seizures,
                Category::Weights,
                Category::Heights,
            ]
        } else {
            &[]
        };
        let rows = self.aggregator.aggregate_group(group_id, categories).await?;

        Ok(rows
            .iter()
            .map(|(patient, records)| PatientSummary {
                patient_id: self.exporter.codec.encode(&patient.id),
                result: Bundle::collection(vec![BundleEntry::new(
                    self.exporter.patient_resource(patient),
                )]),
                meta: with_meta.then(|| {
                    categories
                        .iter()
                        .map(|category| (category.as_str(), records.count(*category)))
                        .collect()
                }),
            })
            .collect())
    }
}

fn observe(scope: &str, timer: Instant) {
    EXPORT_DURATION_SECONDS
        .with_label_values(&[scope])
        .observe(timer.elapsed().as_secs_f64());
}
