//! Clinical record aggregation
//!
//! One independent lookup per category, joined with an all-complete barrier.
//! A failing lookup degrades its category to [`CategoryOutcome::Failed`]
//! without affecting the others.

use crate::db::Repository;
use crate::metrics::AGGREGATION_CATEGORY_FAILURES_TOTAL;
use crate::models::{
    Appointment, ConsentState, Feel, Measurement, MeasurementKind, Medication, Patient,
    PhenotypeEntry, PromAnswer, Seizure,
};
use crate::Result;
use futures::future::join_all;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Medications,
    Phenotype,
    Feels,
    Proms,
    Seizures,
    Weights,
    Heights,
    Consent,
    Appointments,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Medications,
        Category::Phenotype,
        Category::Feels,
        Category::Proms,
        Category::Seizures,
        Category::Weights,
        Category::Heights,
        Category::Consent,
        Category::Appointments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Medications => "medications",
            Category::Phenotype => "phenotype",
            Category::Feels => "feels",
            Category::Proms => "proms",
            Category::Seizures => "seizures",
            Category::Weights => "weights",
            Category::Heights => "heights",
            Category::Consent => "consent",
            Category::Appointments => "appointments",
        }
    }
}

/// Outcome of one category lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome<T> {
    Loaded(Vec<T>),
    /// Lookup failed; the message is for logs only.
    Failed(String),
    /// Category was not requested.
    Skipped,
}

impl<T> Default for CategoryOutcome<T> {
    fn default() -> Self {
        CategoryOutcome::Skipped
    }
}

impl<T> CategoryOutcome<T> {
    /// Records of the category; empty when failed or skipped.
    pub fn items(&self) -> &[T] {
        match self {
            CategoryOutcome::Loaded(items) => items,
            _ => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CategoryOutcome::Failed(_))
    }
}

/// Everything known about one patient, per category.
#[derive(Debug, Clone, Default)]
pub struct PatientRecords {
    pub medications: CategoryOutcome<Medication>,
    pub phenotype: CategoryOutcome<PhenotypeEntry>,
    pub feels: CategoryOutcome<Feel>,
    pub proms: CategoryOutcome<PromAnswer>,
    pub seizures: CategoryOutcome<Seizure>,
    pub weights: CategoryOutcome<Measurement>,
    pub heights: CategoryOutcome<Measurement>,
    /// The patient's consent when it is active.
    pub consent: CategoryOutcome<ConsentState>,
    pub appointments: CategoryOutcome<Appointment>,
}

impl PatientRecords {
    pub fn failed_categories(&self) -> Vec<Category> {
        let flags = [
            (Category::Medications, self.medications.is_failed()),
            (Category::Phenotype, self.phenotype.is_failed()),
            (Category::Feels, self.feels.is_failed()),
            (Category::Proms, self.proms.is_failed()),
            (Category::Seizures, self.seizures.is_failed()),
            (Category::Weights, self.weights.is_failed()),
            (Category::Heights, self.heights.is_failed()),
            (Category::Consent, self.consent.is_failed()),
            (Category::Appointments, self.appointments.is_failed()),
        ];
        flags
            .into_iter()
            .filter_map(|(category, failed)| failed.then_some(category))
            .collect()
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Medications => self.medications.items().len(),
            Category::Phenotype => self.phenotype.items().len(),
            Category::Feels => self.feels.items().len(),
            Category::Proms => self.proms.items().len(),
            Category::Seizures => self.seizures.items().len(),
            Category::Weights => self.weights.items().len(),
            Category::Heights => self.heights.items().len(),
            Category::Consent => self.consent.items().len(),
            Category::Appointments => self.appointments.items().len(),
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    repository: Repository,
}

impl Aggregator {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn aggregate(&self, patient: &Patient) -> PatientRecords {
        self.aggregate_selected(patient, &Category::ALL).await
    }

    /// Look up only `categories`; the rest stay [`CategoryOutcome::Skipped`].
    pub async fn aggregate_selected(&self, patient: &Patient, categories: &[Category]) -> PatientRecords {
        let id = patient.id.as_str();
        let repo = &self.repository;
        let wants = |category: Category| categories.contains(&category);

        let (medications, phenotype, feels, proms, seizures, weights, heights, appointments) = tokio::join!(
            lookup(id, Category::Medications, wants(Category::Medications), repo.medications(id)),
            lookup(id, Category::Phenotype, wants(Category::Phenotype), async {
                Ok::<_, crate::Error>(repo.phenotype(id).await?.map(|p| p.data).unwrap_or_default())
            }),
            lookup(id, Category::Feels, wants(Category::Feels), repo.feels(id)),
            lookup(id, Category::Proms, wants(Category::Proms), repo.prom_answers(id)),
            lookup(id, Category::Seizures, wants(Category::Seizures), repo.seizures(id)),
            lookup(
                id,
                Category::Weights,
                wants(Category::Weights),
                repo.measurements(id, MeasurementKind::Weight)
            ),
            lookup(
                id,
                Category::Heights,
                wants(Category::Heights),
                repo.measurements(id, MeasurementKind::Height)
            ),
            lookup(id, Category::Appointments, wants(Category::Appointments), repo.appointments(id)),
        );

        let consent = if !wants(Category::Consent) {
            CategoryOutcome::Skipped
        } else if patient.consentgroup == ConsentState::True {
            CategoryOutcome::Loaded(vec![patient.consentgroup])
        } else {
            CategoryOutcome::Loaded(Vec::new())
        };

        PatientRecords {
            medications,
            phenotype,
            feels,
            proms,
            seizures,
            weights,
            heights,
            consent,
            appointments,
        }
    }

    /// Aggregate every patient of a group whose consent is active, in
    /// parallel. Patients without active consent are silently left out.
    pub async fn aggregate_group(
        &self,
        group_id: &str,
        categories: &[Category],
    ) -> Result<Vec<(Patient, PatientRecords)>> {
        let patients: Vec<Patient> = self
            .repository
            .patients_in_group(group_id)
            .await?
            .into_iter()
            .filter(|p| p.consentgroup == ConsentState::True)
            .collect();

        let records = join_all(
            patients
                .iter()
                .map(|patient| self.aggregate_selected(patient, categories)),
        )
        .await;

        Ok(patients.into_iter().zip(records).collect())
    }
}

async fn lookup<T, F>(patient_id: &str, category: Category, wanted: bool, fut: F) -> CategoryOutcome<T>
where
    F: Future<Output = Result<Vec<T>>>,
{
    if !wanted {
        return CategoryOutcome::Skipped;
    }
    match fut.await {
        Ok(items) => CategoryOutcome::Loaded(items),
        Err(e) => {
            AGGREGATION_CATEGORY_FAILURES_TOTAL
                .with_label_values(&[category.as_str()])
                .inc();
            tracing::warn!(
                patient_id = %patient_id,
                category = category.as_str(),
                "Category lookup failed: {}",
                e
            );
            CategoryOutcome::Failed(e.to_string())
        }
    }
}
