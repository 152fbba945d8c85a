//! Domain models for the Raito server

pub mod access;
pub mod clinical;
pub mod fhir;
pub mod group;
pub mod patient;
pub mod session;
pub mod user;

pub use access::{AccessRecord, GatePlatform};
pub use clinical::{
    Appointment, Feel, Measurement, MeasurementKind, Medication, Phenotype, PhenotypeEntry,
    PromAnswer, Seizure,
};
pub use fhir::{Bundle, BundleEntry};
pub use group::{AnswerOption, Drug, Group, Questionnaire, QuestionnaireItem};
pub use patient::{
    Capabilities, ConsentState, CustomShare, GeneralShare, IndividualShare, Patient, ShareStatus,
};
pub use session::{Session, SessionData, SessionStatus, SessionType};
pub use user::{Role, User};

/// Fresh internal record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
