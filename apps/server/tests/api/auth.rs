//! Bearer authentication and role checks

use crate::support::{assert_status, TestApp};
use axum::http::{Method, StatusCode};
use raito::models::Role;
use serde_json::json;

#[tokio::test]
async fn protected_routes_need_a_bearer_token() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;

    let (status, headers, body) = app
        .request(Method::GET, &format!("/patients/{patient}"), None, None)
        .await?;
    assert_status(status, StatusCode::UNAUTHORIZED, "no token");
    assert_eq!(headers.get("www-authenticate").unwrap(), "Bearer");
    assert!(body["message"].is_string());

    let (status, _, _) = app
        .request(Method::GET, &format!("/patients/{patient}"), Some("garbage"), None)
        .await?;
    assert_status(status, StatusCode::UNAUTHORIZED, "bad token");

    let (status, _, body) = app.request(Method::GET, "/health", None, None).await?;
    assert_status(status, StatusCode::OK, "health");
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn users_reach_only_their_own_patients() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;

    let owner = app.token("owner-1", Role::User)?;
    let (status, _, body) = app
        .request(Method::GET, &format!("/patients/{patient}"), Some(&owner), None)
        .await?;
    assert_status(status, StatusCode::OK, "owner");
    assert_eq!(body["id"], patient.as_str());
    assert_eq!(body["patientName"], "Ana");
    assert_eq!(body["createdBy"], app.encode("owner-1").as_str());

    let stranger = app.token("owner-2", Role::User)?;
    let (status, _, body) = app
        .request(Method::GET, &format!("/patients/{patient}"), Some(&stranger), None)
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "stranger");
    assert_eq!(body, json!({ "message": "Forbidden" }));

    let (status, _, _) = app
        .request(Method::GET, "/patients/not-an-id", Some(&owner), None)
        .await?;
    assert_status(status, StatusCode::NOT_FOUND, "undecodable id");
    Ok(())
}

#[tokio::test]
async fn catalog_writes_need_elevated_roles() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let group = json!({ "name": "Federation", "drugs": [], "questionnaires": [] });

    let admin = app.token("admin-1", Role::Admin)?;
    let (status, _, _) = app
        .request(Method::PUT, "/group/g1", Some(&admin), Some(group.clone()))
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "admin group write");

    let root = app.token("root", Role::SuperAdmin)?;
    let (status, _, body) = app
        .request(Method::PUT, "/group/g1", Some(&root), Some(group))
        .await?;
    assert_status(status, StatusCode::OK, "superadmin group write");
    assert_eq!(body["id"], "g1");

    let questionnaire = json!({
        "title": "Sleep",
        "items": [{ "idProm": "q1", "text": "How did you sleep?", "type": "Choice" }]
    });
    let (status, _, _) = app
        .request(
            Method::PUT,
            "/resources/questionnaire/sleep",
            Some(&admin),
            Some(questionnaire),
        )
        .await?;
    assert_status(status, StatusCode::OK, "admin questionnaire write");

    let user = app.token("owner-1", Role::User)?;
    let (status, _, body) = app
        .request(Method::GET, "/resources/questionnaire/sleep", Some(&user), None)
        .await?;
    assert_status(status, StatusCode::OK, "questionnaire read");
    assert_eq!(body["items"][0]["idProm"], "q1");
    Ok(())
}

#[tokio::test]
async fn disabled_auth_acts_as_the_system_principal() -> anyhow::Result<()> {
    let app = TestApp::new_with_config(|config| config.auth.enabled = false).await?;
    let (status, _, body) = app.request(Method::GET, "/eo/patients/none", None, None).await?;
    assert_status(status, StatusCode::NOT_FOUND, "unknown group with auth disabled");
    assert!(body["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn only_users_register_patients() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let body = json!({ "patientName": "Ana" });

    for role in [Role::Clinical, Role::Admin] {
        let token = app.token("staff-1", role)?;
        let (status, _, _) = app
            .request(Method::POST, "/patients", Some(&token), Some(body.clone()))
            .await?;
        assert_status(status, StatusCode::FORBIDDEN, "staff registering a patient");
    }

    let user = app.token("owner-1", Role::User)?;
    let (status, _, body) = app
        .request(Method::POST, "/patients", Some(&user), Some(body))
        .await?;
    assert_status(status, StatusCode::CREATED, "user registering a patient");
    assert!(body["patientId"].is_string());
    Ok(())
}
