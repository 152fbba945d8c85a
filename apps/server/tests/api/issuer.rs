//! Issuer callbacks and session status reads

use crate::support::{assert_status, TestApp, CALLBACK_API_KEY, GROUP_ID};
use axum::http::{Method, StatusCode};
use raito::models::Role;
use serde_json::json;

async fn consenting_patient(app: &TestApp) -> anyhow::Result<(String, String)> {
    app.seed_group().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    let (status, _, _) = app
        .request(
            Method::PUT,
            &format!("/patient/consentgroup/{patient}"),
            Some(&owner),
            Some(json!({ "consentgroup": "true" })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "consent");

    let raw = app.decode(&patient)?;
    let sessions = app.state.repository.sessions_for_patient(&raw).await?;
    Ok((patient, sessions[0].id.clone()))
}

#[tokio::test]
async fn callback_advances_the_session() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (patient, session_id) = consenting_patient(&app).await?;
    let owner = app.token("owner-1", Role::User)?;
    let status_path = format!("/issuer/issuance-response/{session_id}");

    let (status, _, body) = app.request(Method::GET, &status_path, Some(&owner), None).await?;
    assert_status(status, StatusCode::OK, "initial status");
    assert_eq!(body["status"], "waiting");

    for code in ["request_retrieved", "issuance_successful"] {
        let (status, _, _) = app
            .request_with_extra_headers(
                Method::POST,
                "/issuer/issuanceCallback",
                None,
                Some(json!({ "code": code, "state": session_id })),
                &[("api-key", CALLBACK_API_KEY)],
            )
            .await?;
        assert_status(status, StatusCode::OK, code);
    }

    let (_, _, body) = app.request(Method::GET, &status_path, Some(&owner), None).await?;
    assert_eq!(body["status"], "issuance_successful");
    assert_eq!(body["message"], "Credential successfully issued");

    let (status, _, body) = app
        .request(
            Method::GET,
            &format!("/issuer/getAll/{patient}"),
            Some(&owner),
            None,
        )
        .await?;
    assert_status(status, StatusCode::OK, "list sessions");
    let sessions = body.as_array().expect("session array");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["type"], "Organization");
    assert_eq!(sessions[0]["createdBy"], patient.as_str());
    Ok(())
}

#[tokio::test]
async fn callback_requires_the_api_key() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, session_id) = consenting_patient(&app).await?;
    let callback = json!({ "code": "issuance_successful", "state": session_id });

    let (status, _, _) = app
        .request(Method::POST, "/issuer/issuanceCallback", None, Some(callback.clone()))
        .await?;
    assert_status(status, StatusCode::UNAUTHORIZED, "missing key");

    let (status, _, _) = app
        .request_with_extra_headers(
            Method::POST,
            "/issuer/issuanceCallback",
            None,
            Some(callback),
            &[("api-key", "wrong")],
        )
        .await?;
    assert_status(status, StatusCode::UNAUTHORIZED, "wrong key");

    let (status, _, _) = app
        .request_with_extra_headers(
            Method::POST,
            "/issuer/issuanceCallback",
            None,
            Some(json!({ "code": "exploded", "state": session_id })),
            &[("api-key", CALLBACK_API_KEY)],
        )
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "unknown code");
    Ok(())
}
