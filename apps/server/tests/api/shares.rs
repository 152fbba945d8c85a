//! Share configuration and optimistic versioning

use crate::support::{assert_status, individual_share, invitation, medical_only, TestApp};
use axum::http::{Method, StatusCode};
use raito::models::{Role, ShareStatus, User};
use serde_json::json;

#[tokio::test]
async fn stale_versions_are_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let path = format!("/openraito/patient/customshare/{patient}");

    let (status, headers, _) = app.request(Method::GET, &path, Some(&owner), None).await?;
    assert_status(status, StatusCode::OK, "read custom shares");
    let etag = headers
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .expect("etag header")
        .to_string();

    let body = json!([invitation("first")]);
    let (status, headers, _) = app
        .request_with_extra_headers(
            Method::POST,
            &path,
            Some(&owner),
            Some(body.clone()),
            &[("if-match", etag.as_str())],
        )
        .await?;
    assert_status(status, StatusCode::OK, "first writer");
    assert_ne!(headers.get("etag").and_then(|v| v.to_str().ok()), Some(etag.as_str()));

    let (status, _, body) = app
        .request_with_extra_headers(
            Method::POST,
            &path,
            Some(&owner),
            Some(json!([invitation("second")])),
            &[("if-match", etag.as_str())],
        )
        .await?;
    assert_status(status, StatusCode::PRECONDITION_FAILED, "second writer");
    assert!(body["message"].is_string());

    let (_, _, body) = app.request(Method::GET, &path, Some(&owner), None).await?;
    let shares = body["customShare"].as_array().expect("custom shares");
    assert_eq!(shares.len(), 1);
    assert!(shares[0]["token"].as_str().unwrap().ends_with("token=first"));
    Ok(())
}

#[tokio::test]
async fn custom_share_tokens_must_be_distinct() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;

    let (status, _, _) = app
        .request(
            Method::POST,
            &format!("/openraito/patient/customshare/{patient}"),
            Some(&owner),
            Some(json!([invitation("same"), invitation("same")])),
        )
        .await?;
    assert_status(status, StatusCode::BAD_REQUEST, "duplicate tokens");
    Ok(())
}

#[tokio::test]
async fn accepting_an_individual_share_issues_a_clinician_credential() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    app.state
        .repository
        .save_user(&User {
            id: "clinician-7".into(),
            user_name: "Marta".into(),
            last_name: "Ruiz".into(),
            email: "marta@example.org".into(),
            role: Role::Clinical,
        })
        .await?;
    let grantee = app.encode("clinician-7");
    let path = format!("/openraito/patient/individualshare/{patient}");

    let (status, _, body) = app
        .request(
            Method::POST,
            &path,
            Some(&owner),
            Some(json!({ "individualShare": [individual_share(&grantee, ShareStatus::Pending)] })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "pending share");
    assert_ne!(body["message"], "qrgenerated");

    let mut accepted = individual_share(&grantee, ShareStatus::Accepted);
    accepted.data = medical_only();
    let (status, _, body) = app
        .request(
            Method::POST,
            &path,
            Some(&owner),
            Some(json!({
                "individualShare": [accepted],
                "indexUpdated": 0,
                "updateStatus": true,
            })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "accept share");
    assert_eq!(body["message"], "qrgenerated");
    assert!(body["data"]["qrCode"].is_string());

    let sessions = app.state.repository.sessions_for_patient(&raw).await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].shared_with, grantee);

    let (status, _, body) = app.request(Method::GET, &path, Some(&owner), None).await?;
    assert_status(status, StatusCode::OK, "read individual shares");
    assert_eq!(body["individualShare"][0]["userInfo"]["userName"], "Marta");
    assert_eq!(body["individualShare"][0]["status"], "Accepted");
    Ok(())
}

#[tokio::test]
async fn share_routes_require_the_owner_or_staff() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let path = format!("/openraito/patient/generalshare/{patient}");

    let stranger = app.token("owner-2", Role::User)?;
    let (status, _, _) = app.request(Method::GET, &path, Some(&stranger), None).await?;
    assert_status(status, StatusCode::FORBIDDEN, "other user");

    let clinician = app.token("clinician-7", Role::Clinical)?;
    let (status, _, body) = app.request(Method::GET, &path, Some(&clinician), None).await?;
    assert_status(status, StatusCode::OK, "staff");
    assert_eq!(body["generalShare"]["data"]["medicalInfo"], false);
    Ok(())
}

#[tokio::test]
async fn general_share_is_posted_as_the_bare_share() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let path = format!("/openraito/patient/generalshare/{patient}");

    let (status, headers, _) = app
        .request(
            Method::POST,
            &path,
            Some(&owner),
            Some(json!({ "data": { "medicalInfo": true }, "notes": "", "token": "" })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "bare general share");
    assert!(headers.get("etag").is_some());

    let (_, _, body) = app.request(Method::GET, &path, Some(&owner), None).await?;
    assert_eq!(body["generalShare"]["data"]["medicalInfo"], true);
    Ok(())
}

#[tokio::test]
async fn custom_shares_are_posted_as_the_bare_array() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let path = format!("/openraito/patient/customshare/{patient}");

    let (status, _, _) = app
        .request(
            Method::POST,
            &path,
            Some(&owner),
            Some(json!([{ "data": { "medicalInfo": true }, "token": "https://x/?token=abc" }])),
        )
        .await?;
    assert_status(status, StatusCode::OK, "bare custom shares");

    let (_, _, body) = app.request(Method::GET, &path, Some(&owner), None).await?;
    let shares = body["customShare"].as_array().expect("custom shares");
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0]["token"], "https://x/?token=abc");
    assert!(shares[0]["id"].as_str().is_some_and(|id| !id.is_empty()));
    Ok(())
}
