//! Credential issuance sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Clinician,
    Organization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    RequestRetrieved,
    IssuanceSuccessful,
    IssuanceError,
}

impl SessionStatus {
    pub fn message(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "Waiting for QR code to be scanned",
            SessionStatus::RequestRetrieved => "QR code has been scanned. Waiting for issuance...",
            SessionStatus::IssuanceSuccessful => "Credential successfully issued",
            SessionStatus::IssuanceError => "Credential issuance failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub status: SessionStatus,
    pub message: String,
}

impl From<SessionStatus> for SessionData {
    fn from(status: SessionStatus) -> Self {
        Self {
            status,
            message: status.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub session_data: SessionData,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Group name for organization sessions, grantee id for clinician ones.
    pub shared_with: String,
    /// Raw id of the patient.
    pub created_by: String,
    #[serde(default)]
    pub data: Option<JsonValue>,
    pub date: DateTime<Utc>,
}

impl Session {
    pub fn new(session_type: SessionType, shared_with: &str, patient_id: &str) -> Self {
        Self {
            id: super::new_id(),
            session_data: SessionStatus::Waiting.into(),
            session_type,
            shared_with: shared_with.to_string(),
            created_by: patient_id.to_string(),
            data: None,
            date: Utc::now(),
        }
    }
}
