//! Patient record and its embedded sharing structures

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Organization-level consent, persisted as `"false" | "Pending" | "true"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsentState {
    #[default]
    #[serde(rename = "false")]
    False,
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "true")]
    True,
}

impl ConsentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentState::False => "false",
            ConsentState::Pending => "Pending",
            ConsentState::True => "true",
        }
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "false" => Ok(ConsentState::False),
            "Pending" => Ok(ConsentState::Pending),
            "true" => Ok(ConsentState::True),
            other => Err(crate::Error::InvalidTransition(format!(
                "unknown consent value '{}'",
                other
            ))),
        }
    }
}

/// Which categories of data a share exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub patient_info: bool,
    pub medical_info: bool,
    pub devices_info: bool,
    pub genomics_info: bool,
}

/// The open-link grant. One per patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralShare {
    pub data: Capabilities,
    #[validate(length(max = 4000))]
    pub notes: String,
    pub date: Option<DateTime<Utc>>,
    pub token: String,
}

/// A token-gated grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomShare {
    pub id: String,
    pub data: Capabilities,
    #[validate(length(max = 4000))]
    pub notes: String,
    pub date: Option<DateTime<Utc>>,
    /// Invitation link; the credential is the part after `token=`.
    pub token: String,
}

impl CustomShare {
    /// The invitation credential embedded in the stored link.
    pub fn invitation_token(&self) -> Option<&str> {
        self.token
            .split_once(crate::services::access::INVITATION_TOKEN_DELIMITER)
            .map(|(_, token)| token)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Revoked,
}

/// A named grant to one user, effective once accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct IndividualShare {
    pub id: String,
    pub data: Capabilities,
    #[validate(length(max = 4000))]
    pub notes: String,
    pub date: Option<DateTime<Utc>>,
    pub token: String,
    /// Encoded id of the grantee.
    pub id_user: String,
    pub status: ShareStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Patient {
    pub id: String,
    /// Raw id of the owning user.
    pub created_by: String,
    pub patient_name: String,
    pub surname: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
    pub phone1: String,
    pub phone2: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub province: String,
    pub country: String,
    /// Raw id of the organization the patient belongs to.
    pub group: Option<String>,
    pub consentgroup: ConsentState,
    pub last_access: Option<DateTime<Utc>>,
    pub general_share: GeneralShare,
    pub custom_share: Vec<CustomShare>,
    pub individual_share: Vec<IndividualShare>,
    /// Storage version, bumped on every write.
    #[serde(skip)]
    pub version: i64,
}

impl Patient {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.patient_name, self.surname)
            .trim()
            .to_string()
    }
}
