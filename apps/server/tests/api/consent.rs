//! Organization consent transitions and their credential sessions

use crate::support::{assert_status, eventually, TestApp, GROUP_ID};
use axum::http::{Method, StatusCode};
use raito::models::{Role, SessionType};
use serde_json::json;

async fn organization_sessions(app: &TestApp, raw: &str) -> anyhow::Result<Vec<String>> {
    Ok(app
        .state
        .repository
        .sessions_for_patient(raw)
        .await?
        .into_iter()
        .filter(|s| s.session_type == SessionType::Organization)
        .map(|s| s.id)
        .collect())
}

#[tokio::test]
async fn consenting_twice_keeps_a_single_organization_session() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    let raw = app.decode(&patient)?;
    let path = format!("/patient/consentgroup/{patient}");

    let (status, _, body) = app.request(Method::GET, &path, Some(&owner), None).await?;
    assert_status(status, StatusCode::OK, "read consent");
    assert_eq!(body["consent"], "false");

    let (status, _, body) = app
        .request(Method::PUT, &path, Some(&owner), Some(json!({ "consentgroup": "true" })))
        .await?;
    assert_status(status, StatusCode::OK, "first consent");
    assert_eq!(body["message"], "qrgenerated");
    assert!(body["data"]["qrCode"].is_string());
    assert!(body["data"]["pin"].is_string());

    let first = organization_sessions(&app, &raw).await?;
    assert_eq!(first.len(), 1);

    let (status, _, body) = app
        .request(Method::PUT, &path, Some(&owner), Some(json!({ "consentgroup": "true" })))
        .await?;
    assert_status(status, StatusCode::OK, "second consent");
    assert_eq!(body["message"], "qrgenerated");

    let second = organization_sessions(&app, &raw).await?;
    assert_eq!(second.len(), 1, "never two organization sessions");
    assert_ne!(first[0], second[0]);

    let patient_doc = app.state.repository.get_patient(&raw).await?.expect("patient");
    assert_eq!(patient_doc.consentgroup.as_str(), "true");
    assert_eq!(app.issuer.issued.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn withdrawing_consent_revokes_issued_credentials() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    let raw = app.decode(&patient)?;
    let path = format!("/patient/consentgroup/{patient}");

    app.request(Method::PUT, &path, Some(&owner), Some(json!({ "consentgroup": "true" })))
        .await?;
    let (status, _, body) = app
        .request(Method::PUT, &path, Some(&owner), Some(json!({ "consentgroup": "false" })))
        .await?;
    assert_status(status, StatusCode::OK, "withdraw");
    assert_eq!(body["consent"], "false");
    assert!(organization_sessions(&app, &raw).await?.is_empty());

    let issuer = app.issuer.clone();
    let revoked = eventually(|| {
        let issuer = issuer.clone();
        async move { Ok(issuer.revoked.lock().unwrap().len() == 1) }
    })
    .await?;
    assert!(revoked, "revocation should reach the issuer");
    Ok(())
}

#[tokio::test]
async fn pending_needs_no_credential_and_bad_values_are_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let path = format!("/patient/consentgroup/{patient}");

    let (status, _, body) = app
        .request(Method::PUT, &path, Some(&owner), Some(json!({ "consentgroup": "Pending" })))
        .await?;
    assert_status(status, StatusCode::OK, "pending");
    assert_eq!(body["consent"], "Pending");
    assert!(app.issuer.issued.lock().unwrap().is_empty());

    let (status, _, _) = app
        .request(Method::PUT, &path, Some(&owner), Some(json!({ "consentgroup": "yes" })))
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "unknown value");
    Ok(())
}
