//! Bulk import through /massiveresources

use crate::support::{assert_status, day, TestApp, GROUP_ID};
use axum::http::{Method, StatusCode};
use raito::models::Role;
use serde_json::{json, Value as JsonValue};

#[tokio::test]
async fn exported_medications_import_into_a_fresh_patient() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.seed_group().await?;
    let admin = app.token("admin-1", Role::Admin)?;

    let source = app.create_patient("owner-1", "Ana", Some(GROUP_ID)).await?;
    let source_raw = app.decode(&source)?;
    app.seed_medication(&source_raw, "Valproate", "200", day(2), Some(day(9)))
        .await?;
    app.seed_medication(&source_raw, "Clobazam", "5 mg twice daily", day(4), None)
        .await?;

    let (status, _, body) = app
        .request(Method::GET, &format!("/eo/patient/{source}"), Some(&admin), None)
        .await?;
    assert_status(status, StatusCode::OK, "export");
    let statements: Vec<JsonValue> = body["result"]["entry"]
        .as_array()
        .expect("entries")
        .iter()
        .filter(|e| e["resource"]["resourceType"] == "MedicationStatement")
        .cloned()
        .collect();
    assert_eq!(statements.len(), 2);

    let target = app.create_patient("owner-2", "Bea", None).await?;
    let owner = app.token("owner-2", Role::User)?;
    let (status, _, body) = app
        .request(
            Method::POST,
            &format!("/massiveresources/{target}"),
            Some(&owner),
            Some(JsonValue::Array(statements.clone())),
        )
        .await?;
    assert_status(status, StatusCode::OK, "import");
    let report = body["eventdb"].as_array().expect("report");
    assert!(report.iter().all(|r| r["status"] == "added"));

    let mut imported = app
        .state
        .repository
        .medications(&app.decode(&target)?)
        .await?;
    imported.sort_by(|a, b| a.start_date.cmp(&b.start_date));
    assert_eq!(imported.len(), 2);
    assert_eq!(imported[0].drug, "Valproate");
    assert_eq!(imported[0].dose, "200");
    assert_eq!(imported[0].start_date, Some(day(2)));
    assert_eq!(imported[0].end_date, Some(day(9)));
    assert_eq!(imported[1].drug, "Clobazam");
    assert_eq!(imported[1].dose, "5 mg twice daily");
    assert_eq!(imported[1].end_date, None);

    // Importing the same statements again changes nothing.
    let (_, _, body) = app
        .request(
            Method::POST,
            &format!("/massiveresources/{target}"),
            Some(&owner),
            Some(JsonValue::Array(statements)),
        )
        .await?;
    let report = body["eventdb"].as_array().expect("report");
    assert!(report.iter().all(|r| r["status"] == "skipped"));
    Ok(())
}

#[tokio::test]
async fn a_bad_entry_does_not_abort_the_batch() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let owner = app.token("owner-1", Role::User)?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;

    let bundle = json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            { "resource": {
                "resourceType": "Observation",
                "code": { "text": "Weight" },
                "effectiveDateTime": "2024-03-02T08:00:00Z",
                "valueQuantity": { "value": 21.5, "unit": "kg" }
            }},
            { "resource": { "resourceType": "MedicationStatement", "status": "active" } },
            { "resource": { "resourceType": "Patient", "id": "p1" } }
        ]
    });
    let (status, _, body) = app
        .request(
            Method::POST,
            &format!("/massiveresources/{patient}"),
            Some(&owner),
            Some(bundle),
        )
        .await?;
    assert_status(status, StatusCode::OK, "import");
    let statuses: Vec<&str> = body["eventdb"]
        .as_array()
        .expect("report")
        .iter()
        .filter_map(|r| r["status"].as_str())
        .collect();
    assert_eq!(statuses, vec!["added", "failed", "skipped"]);
    Ok(())
}

#[tokio::test]
async fn import_into_someone_elses_patient_is_forbidden() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let patient = app.create_patient("owner-1", "Ana", None).await?;
    let stranger = app.token("owner-2", Role::User)?;

    let (status, _, _) = app
        .request(
            Method::POST,
            &format!("/massiveresources/{patient}"),
            Some(&stranger),
            Some(json!([])),
        )
        .await?;
    assert_status(status, StatusCode::FORBIDDEN, "stranger import");
    Ok(())
}
