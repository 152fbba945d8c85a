//! Patient documents

use super::{Collection, Repository};
use crate::models::Patient;
use crate::Result;

impl Repository {
    pub async fn get_patient(&self, id: &str) -> Result<Option<Patient>> {
        match self.store.read(Collection::Patients, id).await? {
            Some(doc) => {
                let mut patient: Patient = serde_json::from_value(doc.body)?;
                patient.version = doc.version;
                Ok(Some(patient))
            }
            None => Ok(None),
        }
    }

    pub async fn insert_patient(&self, mut patient: Patient) -> Result<Patient> {
        let doc = self
            .insert(Collection::Patients, &patient.id, None, &patient)
            .await?;
        patient.version = doc.version;
        Ok(patient)
    }

    /// Read-modify-write of one patient.
    ///
    /// When `expected_version` is set the caller's view must still be current;
    /// the write itself is always conditional on the version that was read, so
    /// a concurrent writer surfaces as `Error::VersionConflict` rather than a
    /// lost update.
    pub async fn update_patient<F>(
        &self,
        id: &str,
        expected_version: Option<i64>,
        mutate: F,
    ) -> Result<Patient>
    where
        F: FnOnce(&mut Patient) -> Result<()> + Send,
    {
        let mut patient = self
            .get_patient(id)
            .await?
            .ok_or_else(crate::Error::patient_not_found)?;

        if let Some(expected) = expected_version {
            if expected != patient.version {
                return Err(crate::Error::VersionConflict {
                    expected,
                    actual: patient.version,
                });
            }
        }

        mutate(&mut patient)?;

        let body = serde_json::to_value(&patient)?;
        let doc = self
            .store
            .update(Collection::Patients, id, body, Some(patient.version))
            .await?;
        patient.version = doc.version;
        Ok(patient)
    }

    /// Patients affiliated with the group, in insertion order.
    ///
    /// A document that no longer reads as a patient is logged and left out,
    /// so one bad record does not take the whole group down with it.
    pub async fn patients_in_group(&self, group_id: &str) -> Result<Vec<Patient>> {
        let docs = self
            .store
            .find_by_field(Collection::Patients, "group", group_id)
            .await?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<Patient>(doc.body) {
                Ok(mut patient) => {
                    patient.version = doc.version;
                    Some(patient)
                }
                Err(e) => {
                    tracing::warn!(
                        patient_id = %doc.id,
                        group_id = %group_id,
                        error = %e,
                        "Skipping unreadable patient document"
                    );
                    None
                }
            })
            .collect())
    }
}
