//! Access audit records written on every successful gate pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatePlatform {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "openReg")]
    OpenRegistered,
    #[serde(rename = "invitation")]
    Invitation,
}

impl GatePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatePlatform::Open => "open",
            GatePlatform::OpenRegistered => "openReg",
            GatePlatform::Invitation => "invitation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub id: String,
    pub platform: GatePlatform,
    pub route: String,
    /// Request snapshot and the grant that matched.
    pub data: JsonValue,
    /// Raw id of the patient whose data was read.
    pub created_by: String,
    pub date: DateTime<Utc>,
}
