//! FHIR export routes

use crate::api::handlers::export;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/eo/patient/:patientId", get(export::patient_bundle))
        .route("/eo/patients/:groupId", get(export::group_bundles))
        .route("/eo/drugs/:groupId", get(export::drugs))
        .route("/eo/phenotypes/:groupId", get(export::phenotypes))
        .route("/eo/feels/:groupId", get(export::feels))
        .route("/eo/proms/:groupId", get(export::proms))
        .route("/eo/seizures/:groupId", get(export::seizures))
        .route("/eo/weights/:groupId", get(export::weights))
        .route("/eo/heights/:groupId", get(export::heights))
        .route("/eo/consent/:patientId", get(export::consent_bundle))
        .route("/eo/onlypatients/:groupId", post(export::only_patients))
}
