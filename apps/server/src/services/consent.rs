//! Organization consent (`consentgroup`) state machine and its side effects

use crate::db::Repository;
use crate::models::{ConsentState, Patient, Session, SessionType};
use crate::services::issuer::IssuerService;
use crate::{Error, Result};
use serde_json::json;

/// What must happen outside the patient document after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentEffect {
    None,
    /// Replace the patient's organization sessions with one fresh issuance.
    Issue,
    /// Drop every organization session and revoke what was issued.
    Revoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ConsentState,
    pub effect: ConsentEffect,
}

/// Transition table for `consentgroup`.
///
/// `requested` is the raw value submitted by the client; anything other than
/// `"false"`, `"Pending"` or `"true"` is rejected.
pub fn next_state(current: ConsentState, requested: &str) -> Result<Transition> {
    use ConsentState::*;

    let requested: ConsentState = requested.parse()?;
    let transition = match (current, requested) {
        (False, False) | (Pending, False) | (True, False) => Transition {
            next: False,
            effect: ConsentEffect::Revoke,
        },
        (False, Pending) | (True, Pending) => Transition {
            next: Pending,
            effect: ConsentEffect::None,
        },
        (Pending, Pending) => Transition {
            next: Pending,
            effect: ConsentEffect::None,
        },
        (False, True) | (Pending, True) | (True, True) => Transition {
            next: True,
            effect: ConsentEffect::Issue,
        },
    };
    Ok(transition)
}

/// Result of applying a consent change.
#[derive(Debug)]
pub enum ConsentOutcome {
    /// Consent is now `true` and a credential offer is ready.
    Issued { patient: Patient, session: Session },
    /// Consent changed; no credential offer (none needed, or issuance failed).
    Changed { patient: Patient },
}

#[derive(Clone)]
pub struct ConsentService {
    repository: Repository,
    issuer: IssuerService,
}

impl ConsentService {
    pub fn new(repository: Repository, issuer: IssuerService) -> Self {
        Self { repository, issuer }
    }

    pub async fn change(&self, patient_id: &str, requested: &str) -> Result<ConsentOutcome> {
        let patient = self
            .repository
            .get_patient(patient_id)
            .await?
            .ok_or_else(Error::patient_not_found)?;

        let transition = next_state(patient.consentgroup, requested)?;

        // Issuance needs the organization before anything is persisted.
        let group = match transition.effect {
            ConsentEffect::Issue => {
                let group_id = patient
                    .group
                    .as_deref()
                    .ok_or_else(|| Error::NotFound("Patient has no group".to_string()))?;
                Some(
                    self.repository
                        .get_group(group_id)
                        .await?
                        .ok_or_else(|| Error::NotFound("Group not found".to_string()))?,
                )
            }
            _ => None,
        };

        let patient = self
            .repository
            .update_patient(patient_id, Some(patient.version), |p| {
                p.consentgroup = transition.next;
                Ok(())
            })
            .await?;

        tracing::info!(
            patient_id = %patient_id,
            consent = %transition.next,
            effect = ?transition.effect,
            "Consent changed"
        );

        match (transition.effect, group) {
            (ConsentEffect::Issue, Some(group)) => {
                let superseded = self
                    .repository
                    .delete_sessions(patient_id, SessionType::Organization, None)
                    .await?;
                if !superseded.is_empty() {
                    tracing::debug!(count = superseded.len(), "Superseded organization sessions deleted");
                }

                let session = Session::new(SessionType::Organization, &group.name, patient_id);
                let claims = json!({
                    "given_patient": patient.display_name(),
                    "given_to": group.name,
                    "organization_id": group.id,
                    "consent": transition.next,
                });
                match self.issuer.issue(session, claims).await {
                    Ok(session) => Ok(ConsentOutcome::Issued { patient, session }),
                    Err(e) => {
                        tracing::warn!(patient_id = %patient_id, "Credential issuance failed: {}", e);
                        Ok(ConsentOutcome::Changed { patient })
                    }
                }
            }
            (ConsentEffect::Revoke, _) => {
                let revoked = self
                    .repository
                    .delete_sessions(patient_id, SessionType::Organization, None)
                    .await?;
                self.issuer.enqueue_revocations(revoked);
                Ok(ConsentOutcome::Changed { patient })
            }
            _ => Ok(ConsentOutcome::Changed { patient }),
        }
    }
}
