//! Access gates on the collaborator read routes

use crate::support::{
    assert_status, day, eventually, individual_share, invitation, medical_only, TestApp,
};
use axum::http::{Method, StatusCode};
use raito::models::{GatePlatform, Role, ShareStatus};
use serde_json::json;

#[tokio::test]
async fn open_link_follows_the_medical_info_bit() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    app.seed_medication(&raw, "Valproate", "200", day(2), None).await?;

    let read = format!("/openraito/medications/dates/{patient}");
    let (status, _, _) = app.request(Method::POST, &read, None, Some(json!({}))).await?;
    assert_status(status, StatusCode::FORBIDDEN, "closed link");

    let share = format!("/openraito/patient/generalshare/{patient}");
    let (status, _, _) = app
        .request(
            Method::POST,
            &share,
            Some(&owner),
            Some(json!({ "data": medical_only(), "notes": "" })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "enable open link");

    let (status, _, body) = app.request(Method::POST, &read, None, Some(json!({}))).await?;
    assert_status(status, StatusCode::OK, "open link");
    let records = body.as_array().expect("medication array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["drug"], "Valproate");
    assert!(records[0].get("createdBy").is_none());

    let (status, _, _) = app
        .request(
            Method::POST,
            &share,
            Some(&owner),
            Some(json!({ "data": { "medicalInfo": false } })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "disable open link");

    let (status, _, body) = app.request(Method::POST, &read, None, Some(json!({}))).await?;
    assert_status(status, StatusCode::FORBIDDEN, "closed again");
    assert_eq!(body, json!({ "message": "Forbidden" }));
    Ok(())
}

#[tokio::test]
async fn registered_viewer_needs_an_accepted_share() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    let viewer = app.encode("clinician-7");

    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.individual_share = vec![individual_share(&viewer, ShareStatus::Pending)];
            Ok(())
        })
        .await?;

    let read = format!("/openraito/v2/feels/dates/{patient}");
    let credential = json!({ "userId": viewer });
    let (status, _, _) = app
        .request(Method::POST, &read, None, Some(credential.clone()))
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "pending share");

    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.individual_share[0].status = ShareStatus::Accepted;
            Ok(())
        })
        .await?;

    let (status, _, _) = app
        .request(Method::POST, &read, None, Some(credential))
        .await?;
    assert_status(status, StatusCode::OK, "accepted share");

    let (status, _, _) = app
        .request(
            Method::POST,
            &read,
            None,
            Some(json!({ "userId": app.encode("someone-else") })),
        )
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "other viewer");
    Ok(())
}

#[tokio::test]
async fn invitation_gate_matches_the_link_token() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.custom_share = vec![invitation("abc123")];
            Ok(())
        })
        .await?;

    let read = format!("/openraito/invitation/seizures/dates/{patient}");
    let (status, _, body) = app
        .request(Method::POST, &read, None, Some(json!({ "token": "abc123" })))
        .await?;
    assert_status(status, StatusCode::OK, "valid token");
    assert_eq!(body, json!([]));

    for credential in [json!({ "token": "abc" }), json!({}), json!({ "userId": "abc123" })] {
        let (status, _, _) = app
            .request(Method::POST, &read, None, Some(credential))
            .await?;
        assert_status(status, StatusCode::FORBIDDEN, "bad token");
    }
    Ok(())
}

#[tokio::test]
async fn unknown_or_forged_patient_ids_are_denied() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let ghost = app.encode("ghost");
    for id in ["not-hex", "00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff", ghost.as_str()] {
        let (status, _, _) = app
            .request(
                Method::POST,
                &format!("/openraito/phenotypes/{id}"),
                None,
                Some(json!({})),
            )
            .await?;
        assert_status(status, StatusCode::FORBIDDEN, id);
    }
    Ok(())
}

#[tokio::test]
async fn successful_pass_writes_one_access_record() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.general_share.data = medical_only();
            Ok(())
        })
        .await?;

    let (status, _, _) = app
        .request(
            Method::POST,
            &format!("/openraito/seizures/dates/{patient}"),
            None,
            Some(json!({ "start": "2024-01-01T00:00:00Z" })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "gated read");

    let repository = app.state.repository.clone();
    let written = eventually(|| {
        let repository = repository.clone();
        let raw = raw.clone();
        async move { Ok(repository.access_records(&raw).await?.len() == 1) }
    })
    .await?;
    assert!(written, "access record should be persisted");

    let records = app.state.repository.access_records(&raw).await?;
    assert_eq!(records[0].platform, GatePlatform::Open);
    assert_eq!(records[0].data["request"]["method"], "POST");
    assert_eq!(records[0].data["request"]["body"]["start"], "2024-01-01T00:00:00Z");
    assert!(records[0].data["grant"]["generalShare"].is_object());

    // Denials leave no trace.
    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.general_share.data.medical_info = false;
            Ok(())
        })
        .await?;
    let (status, _, _) = app
        .request(
            Method::POST,
            &format!("/openraito/seizures/dates/{patient}"),
            None,
            Some(json!({})),
        )
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "closed link");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.state.repository.access_records(&raw).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn date_window_filters_medications() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    app.seed_medication(&raw, "Valproate", "200", day(2), None).await?;
    app.seed_medication(&raw, "Clobazam", "10", day(20), None).await?;
    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.general_share.data = medical_only();
            Ok(())
        })
        .await?;

    let (status, _, body) = app
        .request(
            Method::POST,
            &format!("/openraito/medications/dates/{patient}"),
            None,
            Some(json!({ "start": "2024-03-10T00:00:00Z", "end": "2024-03-31T00:00:00Z" })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "windowed read");
    let records = body.as_array().expect("medication array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["drug"], "Clobazam");
    Ok(())
}

#[tokio::test]
async fn malformed_bodies_are_denied_like_any_failed_check() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let raw = app.decode(&patient)?;
    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.general_share.data = medical_only();
            Ok(())
        })
        .await?;

    for prefix in ["/openraito", "/openraito/v2", "/openraito/invitation"] {
        let (status, _, body) = app
            .request_raw(Method::POST, &format!("{prefix}/phenotypes/{patient}"), "{not json")
            .await?;
        assert_status(status, StatusCode::FORBIDDEN, prefix);
        assert_eq!(body, json!({ "message": "Forbidden" }));
    }

    let ghost = app.encode("ghost");
    let (status, _, _) = app
        .request_raw(Method::POST, &format!("/openraito/phenotypes/{ghost}"), "{not json")
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "unknown patient");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(app.state.repository.access_records(&raw).await?.is_empty());
    Ok(())
}
