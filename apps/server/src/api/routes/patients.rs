//! Patient, share, consent, import and catalog routes (bearer-authenticated)

use crate::api::handlers::{admin, consent, import, patients, shares};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn patient_routes() -> Router<AppState> {
    Router::new()
        .route("/patients", post(patients::create_patient))
        .route("/patients/:patientId", get(patients::get_patient))
        .route(
            "/openraito/patient/generalshare/:patientId",
            get(shares::get_general_share).post(shares::set_general_share),
        )
        .route(
            "/openraito/patient/customshare/:patientId",
            get(shares::get_custom_share).post(shares::set_custom_share),
        )
        .route(
            "/openraito/patient/individualshare/:patientId",
            get(shares::get_individual_share).post(shares::set_individual_share),
        )
        .route(
            "/patient/consentgroup/:patientId",
            get(consent::get_consent).put(consent::set_consent),
        )
        .route("/massiveresources/:patientId", post(import::import_resources))
        .route(
            "/group/:groupId",
            get(admin::get_group).put(admin::put_group),
        )
        .route(
            "/resources/questionnaire/:questionnaireId",
            get(admin::get_questionnaire).put(admin::put_questionnaire),
        )
}
