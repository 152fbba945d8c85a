//! FHIR export routes

use crate::support::{assert_status, day, TestApp, GROUP_ID};
use axum::http::{Method, StatusCode};
use raito::models::{ConsentState, Role};
use serde_json::{json, Value as JsonValue};

async fn consent(app: &TestApp, encoded: &str) -> anyhow::Result<String> {
    let raw = app.decode(encoded)?;
    app.state
        .repository
        .update_patient(&raw, None, |p| {
            p.consentgroup = ConsentState::True;
            Ok(())
        })
        .await?;
    Ok(raw)
}

fn resources<'a>(bundle: &'a JsonValue, resource_type: &'a str) -> Vec<&'a JsonValue> {
    bundle["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|e| &e["resource"])
                .filter(|r| r["resourceType"] == resource_type)
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn group_export_includes_only_consenting_patients() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let admin = app.token("admin-1", Role::Admin)?;

    let ana = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    app.create_patient("owner-2", "Bea", Some(GROUP_ID)).await?;
    let carla = app.create_patient("owner-3", "Carla", Some(GROUP_ID)).await?;
    let ana_raw = consent(&app, &ana).await?;
    let carla_raw = app.decode(&carla)?;
    app.state
        .repository
        .update_patient(&carla_raw, None, |p| {
            p.consentgroup = ConsentState::Pending;
            Ok(())
        })
        .await?;
    app.seed_medication(&ana_raw, "Valproate", "200", day(2), None).await?;

    let (status, _, body) = app
        .request(Method::GET, &format!("/eo/patients/{GROUP_ID}"), Some(&admin), None)
        .await?;
    assert_status(status, StatusCode::OK, "group export");
    let exports = body.as_array().expect("export array");
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0]["patientId"], ana.as_str());

    let bundle = &exports[0]["result"];
    assert_eq!(bundle["resourceType"], "Bundle");
    assert_eq!(bundle["entry"][0]["resource"]["resourceType"], "Patient");
    assert_eq!(bundle["entry"][0]["resource"]["id"], ana.as_str());
    assert_eq!(bundle["entry"][1]["resource"]["resourceType"], "Condition");

    let statements = resources(bundle, "MedicationStatement");
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["status"], "active");
    assert_eq!(statements[0]["contained"][0]["id"], "drug-valproate");
    assert_eq!(
        statements[0]["contained"][0]["code"]["coding"][0]["code"],
        "387080000"
    );

    let consents = resources(bundle, "Consent");
    assert_eq!(consents.len(), 1);
    Ok(())
}

#[tokio::test]
async fn feel_export_reports_the_rounded_mean() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let admin = app.token("admin-1", Role::SuperAdmin)?;
    let ana = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    let raw = consent(&app, &ana).await?;
    app.seed_feel(&raw, [3, 3, 3]).await?;
    app.seed_feel(&raw, [1, 1, 2]).await?;

    let (status, _, body) = app
        .request(Method::GET, &format!("/eo/feels/{GROUP_ID}"), Some(&admin), None)
        .await?;
    assert_status(status, StatusCode::OK, "feels export");
    let observations = resources(&body, "Observation");
    let values: Vec<f64> = observations
        .iter()
        .filter_map(|o| o["valueQuantity"]["value"].as_f64())
        .collect();
    assert_eq!(values, vec![3.0, 1.33]);
    assert!(observations.iter().all(|o| o["code"]["text"] == "Feel"));
    Ok(())
}

#[tokio::test]
async fn unknown_group_is_not_found_and_empty_group_is_empty() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let admin = app.token("admin-1", Role::Admin)?;

    let (status, _, _) = app
        .request(Method::GET, "/eo/patients/no-such-group", Some(&admin), None)
        .await?;
    assert_status(status, StatusCode::NOT_FOUND, "unknown group");

    let (status, _, body) = app
        .request(Method::GET, &format!("/eo/drugs/{GROUP_ID}"), Some(&admin), None)
        .await?;
    assert_status(status, StatusCode::OK, "empty group");
    assert_eq!(body["entry"], json!([]));
    Ok(())
}

#[tokio::test]
async fn consent_bundle_and_patient_summaries() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let admin = app.token("admin-1", Role::Admin)?;
    let ana = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    let bea = app.create_patient("owner-2", "Bea", Some(GROUP_ID)).await?;
    let raw = consent(&app, &ana).await?;
    app.seed_medication(&raw, "Valproate", "200", day(2), None).await?;

    let (_, _, body) = app
        .request(Method::GET, &format!("/eo/consent/{ana}"), Some(&admin), None)
        .await?;
    let consents = resources(&body, "Consent");
    assert_eq!(consents.len(), 1);
    assert_eq!(consents[0]["id"], ana.as_str());

    let (_, _, body) = app
        .request(Method::GET, &format!("/eo/consent/{bea}"), Some(&admin), None)
        .await?;
    assert_eq!(body["entry"], json!([]));

    let (status, _, body) = app
        .request(
            Method::POST,
            &format!("/eo/onlypatients/{GROUP_ID}"),
            Some(&admin),
            Some(json!({ "meta": true })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "only patients");
    let summaries = body.as_array().expect("summary array");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["meta"]["medications"], 1);
    assert_eq!(summaries[0]["meta"]["seizures"], 0);
    Ok(())
}

#[tokio::test]
async fn export_is_limited_to_admins() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let ana = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;

    for role in [Role::User, Role::Clinical] {
        let token = app.token("someone", role)?;
        let (status, _, _) = app
            .request(Method::GET, &format!("/eo/patient/{ana}"), Some(&token), None)
            .await?;
        assert_status(status, StatusCode::FORBIDDEN, "non-admin export");
    }
    Ok(())
}
