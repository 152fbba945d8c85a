//! Clinical sub-record collections, all scoped by the owning patient's raw id

use super::{Collection, Repository};
use crate::models::{
    new_id, Appointment, Feel, Measurement, MeasurementKind, Medication, Phenotype,
    PhenotypeEntry, PromAnswer, Seizure,
};
use crate::Result;
use chrono::Utc;

fn measurement_collection(kind: MeasurementKind) -> Collection {
    match kind {
        MeasurementKind::Weight => Collection::Weights,
        MeasurementKind::Height => Collection::Heights,
    }
}

impl Repository {
    pub async fn medications(&self, patient_id: &str) -> Result<Vec<Medication>> {
        self.list(Collection::Medications, patient_id).await
    }

    pub async fn insert_medication(&self, medication: &Medication) -> Result<()> {
        self.insert(
            Collection::Medications,
            &medication.id,
            Some(&medication.created_by),
            medication,
        )
        .await?;
        Ok(())
    }

    /// The patient's phenotype document, if one was ever written.
    pub async fn phenotype(&self, patient_id: &str) -> Result<Option<Phenotype>> {
        let mut docs: Vec<Phenotype> = self.list(Collection::Phenotypes, patient_id).await?;
        Ok(docs.pop())
    }

    /// Append a term to the patient's phenotype document, creating it on first
    /// use. Returns `false` when the code is already recorded.
    pub async fn add_phenotype_entry(&self, patient_id: &str, entry: PhenotypeEntry) -> Result<bool> {
        let mut phenotype = match self.phenotype(patient_id).await? {
            Some(existing) => existing,
            None => Phenotype {
                id: new_id(),
                created_by: patient_id.to_string(),
                date: Some(Utc::now()),
                data: Vec::new(),
            },
        };

        if phenotype.data.iter().any(|e| e.code == entry.code) {
            return Ok(false);
        }
        phenotype.data.push(entry);
        phenotype.date = Some(Utc::now());

        self.upsert(Collection::Phenotypes, &phenotype.id, Some(patient_id), &phenotype)
            .await?;
        Ok(true)
    }

    pub async fn feels(&self, patient_id: &str) -> Result<Vec<Feel>> {
        self.list(Collection::Feels, patient_id).await
    }

    pub async fn insert_feel(&self, feel: &Feel) -> Result<()> {
        self.insert(Collection::Feels, &feel.id, Some(&feel.created_by), feel)
            .await?;
        Ok(())
    }

    pub async fn prom_answers(&self, patient_id: &str) -> Result<Vec<PromAnswer>> {
        self.list(Collection::Proms, patient_id).await
    }

    /// Insert or update the answer keyed by (questionnaire, item, patient).
    /// Returns `true` when an existing answer was updated.
    pub async fn upsert_prom_answer(&self, mut answer: PromAnswer) -> Result<bool> {
        let existing = self
            .prom_answers(&answer.created_by)
            .await?
            .into_iter()
            .find(|a| a.id_questionnaire == answer.id_questionnaire && a.id_prom == answer.id_prom);

        let updated = match existing {
            Some(current) => {
                answer.id = current.id;
                true
            }
            None => false,
        };

        self.upsert(Collection::Proms, &answer.id, Some(&answer.created_by), &answer)
            .await?;
        Ok(updated)
    }

    pub async fn seizures(&self, patient_id: &str) -> Result<Vec<Seizure>> {
        self.list(Collection::Seizures, patient_id).await
    }

    pub async fn insert_seizure(&self, seizure: &Seizure) -> Result<()> {
        self.insert(Collection::Seizures, &seizure.id, Some(&seizure.created_by), seizure)
            .await?;
        Ok(())
    }

    /// Measurement history sorted by date ascending.
    pub async fn measurements(&self, patient_id: &str, kind: MeasurementKind) -> Result<Vec<Measurement>> {
        let mut history: Vec<Measurement> =
            self.list(measurement_collection(kind), patient_id).await?;
        history.sort_by_key(|m| m.date);
        Ok(history)
    }

    pub async fn insert_measurement(&self, kind: MeasurementKind, measurement: &Measurement) -> Result<()> {
        self.insert(
            measurement_collection(kind),
            &measurement.id,
            Some(&measurement.created_by),
            measurement,
        )
        .await?;
        Ok(())
    }

    pub async fn appointments(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        self.list(Collection::Appointments, patient_id).await
    }

    pub async fn insert_appointment(&self, appointment: &Appointment) -> Result<()> {
        self.insert(
            Collection::Appointments,
            &appointment.id,
            Some(&appointment.created_by),
            appointment,
        )
        .await?;
        Ok(())
    }
}
