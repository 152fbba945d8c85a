//! Access gate decisions
//!
//! Three grant types protect the collaborator read routes. Each evaluation
//! looks only at the patient's current share configuration and the credential
//! supplied with the request; a denial carries no detail about which check
//! failed.

use crate::models::{GatePlatform, Patient, ShareStatus};
use serde_json::{json, Value as JsonValue};

/// Custom-share links carry their credential after this marker.
pub const INVITATION_TOKEN_DELIMITER: &str = "token=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Anyone holding the patient's public link.
    OpenLink,
    /// A registered user named in an accepted individual share, or anyone
    /// when the open link is enabled.
    RegisteredViewer,
    /// A holder of a custom-share invitation token.
    Invitation,
}

impl GateKind {
    pub fn platform(&self) -> GatePlatform {
        match self {
            GateKind::OpenLink => GatePlatform::Open,
            GateKind::RegisteredViewer => GatePlatform::OpenRegistered,
            GateKind::Invitation => GatePlatform::Invitation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::OpenLink => "open_link",
            GateKind::RegisteredViewer => "registered_viewer",
            GateKind::Invitation => "invitation",
        }
    }
}

/// Credential fields a caller may present in the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Encoded id of the viewer (`userId`).
    pub user_id: Option<String>,
    /// Invitation token (`token`).
    pub token: Option<String>,
}

impl Credential {
    pub fn from_body(body: &JsonValue) -> Self {
        let field = |name: &str| {
            body.get(name)
                .and_then(JsonValue::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            user_id: field("userId"),
            token: field("token"),
        }
    }
}

/// The share that satisfied a gate, recorded in the access log.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub platform: GatePlatform,
    pub share: JsonValue,
}

/// Evaluate `kind` for `patient`. `None` means deny.
pub fn evaluate(kind: GateKind, patient: &Patient, credential: &Credential) -> Option<Grant> {
    let open_link = || {
        patient.general_share.data.medical_info.then(|| Grant {
            platform: kind.platform(),
            share: json!({ "generalShare": patient.general_share }),
        })
    };

    match kind {
        GateKind::OpenLink => open_link(),
        GateKind::RegisteredViewer => open_link().or_else(|| {
            let user_id = credential.user_id.as_deref()?;
            patient
                .individual_share
                .iter()
                .find(|share| {
                    share.status == ShareStatus::Accepted
                        && share.id_user == user_id
                        && share.data.medical_info
                })
                .map(|share| Grant {
                    platform: kind.platform(),
                    share: json!({ "individualShare": share }),
                })
        }),
        GateKind::Invitation => {
            let token = credential.token.as_deref()?;
            patient
                .custom_share
                .iter()
                .find(|share| share.invitation_token() == Some(token) && share.data.medical_info)
                .map(|share| Grant {
                    platform: kind.platform(),
                    share: json!({ "customShare": share }),
                })
        }
    }
}
