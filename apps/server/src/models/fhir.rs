//! FHIR bundle envelope

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: JsonValue,
}

impl BundleEntry {
    /// Entry whose `fullUrl` is `<resourceType>/<id>` of the resource.
    pub fn new(resource: JsonValue) -> Self {
        let resource_type = resource
            .get("resourceType")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let id = resource
            .get("id")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        Self {
            full_url: format!("{}/{}", resource_type, id),
            resource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    pub id: String,
    #[serde(rename = "type")]
    pub bundle_type: String,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn collection(entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: "bundle-references".to_string(),
            bundle_type: "collection".to_string(),
            entry,
        }
    }

    pub fn resources_of<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a JsonValue> {
        self.entry.iter().map(|e| &e.resource).filter(move |r| {
            r.get("resourceType").and_then(JsonValue::as_str) == Some(resource_type)
        })
    }
}

pub fn format_instant(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// Parse a FHIR `dateTime`/`date`/`instant` string.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
