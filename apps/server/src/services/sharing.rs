//! Share configuration: read and whole-array replace of the three share kinds
//!
//! Every replacement is conditional on the patient version the caller last
//! saw (when supplied), so concurrent editors get a precondition failure
//! instead of silently overwriting each other.

use crate::codec::IdCodec;
use crate::db::Repository;
use crate::models::{
    new_id, Capabilities, CustomShare, GeneralShare, IndividualShare, Patient, Session,
    SessionType, ShareStatus,
};
use crate::services::issuer::IssuerService;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualShareView {
    #[serde(flatten)]
    pub share: IndividualShare,
    pub user_info: UserInfo,
}

#[derive(Debug, Clone, Default)]
pub struct IndividualShareUpdate {
    pub shares: Vec<IndividualShare>,
    /// Entry whose status changed, when `update_status` is set.
    pub index_updated: Option<usize>,
    pub update_status: bool,
    pub expected_version: Option<i64>,
}

#[derive(Debug)]
pub enum IndividualShareOutcome {
    Updated(Patient),
    Issued { patient: Patient, session: Session },
}

#[derive(Clone)]
pub struct SharingService {
    repository: Repository,
    codec: Arc<IdCodec>,
    issuer: IssuerService,
}

impl SharingService {
    pub fn new(repository: Repository, codec: Arc<IdCodec>, issuer: IssuerService) -> Self {
        Self {
            repository,
            codec,
            issuer,
        }
    }

    pub async fn patient(&self, patient_id: &str) -> Result<Patient> {
        self.repository
            .get_patient(patient_id)
            .await?
            .ok_or_else(Error::patient_not_found)
    }

    pub async fn set_general_share(
        &self,
        patient_id: &str,
        share: GeneralShare,
        expected_version: Option<i64>,
    ) -> Result<Patient> {
        share.validate()?;
        self.repository
            .update_patient(patient_id, expected_version, move |p| {
                p.general_share = share;
                Ok(())
            })
            .await
    }

    pub async fn set_custom_shares(
        &self,
        patient_id: &str,
        mut shares: Vec<CustomShare>,
        expected_version: Option<i64>,
    ) -> Result<Patient> {
        let mut tokens = HashSet::new();
        for share in shares.iter_mut() {
            share.validate()?;
            if share.id.is_empty() {
                share.id = new_id();
            }
            if !share.token.is_empty() && !tokens.insert(share.token.clone()) {
                return Err(Error::Validation(
                    "custom share tokens must be distinct".to_string(),
                ));
            }
        }

        self.repository
            .update_patient(patient_id, expected_version, move |p| {
                p.custom_share = shares;
                Ok(())
            })
            .await
    }

    pub async fn individual_shares(&self, patient_id: &str) -> Result<(Vec<IndividualShareView>, i64)> {
        let patient = self.patient(patient_id).await?;
        let mut views = Vec::with_capacity(patient.individual_share.len());
        for share in patient.individual_share {
            let user_info = self.user_info(&share.id_user).await?;
            views.push(IndividualShareView { share, user_info });
        }
        Ok((views, patient.version))
    }

    pub async fn set_individual_shares(
        &self,
        patient_id: &str,
        update: IndividualShareUpdate,
    ) -> Result<IndividualShareOutcome> {
        let IndividualShareUpdate {
            mut shares,
            index_updated,
            update_status,
            expected_version,
        } = update;

        for share in shares.iter_mut() {
            share.validate()?;
            if share.id.is_empty() {
                share.id = new_id();
            }
        }

        let changed = match (update_status, index_updated) {
            (true, Some(index)) => Some(
                shares
                    .get(index)
                    .cloned()
                    .ok_or_else(|| Error::Validation("indexUpdated is out of range".to_string()))?,
            ),
            (true, None) => {
                return Err(Error::Validation(
                    "indexUpdated is required with updateStatus".to_string(),
                ))
            }
            _ => None,
        };

        let patient = self
            .repository
            .update_patient(patient_id, expected_version, move |p| {
                p.individual_share = shares;
                Ok(())
            })
            .await?;

        let Some(share) = changed else {
            return Ok(IndividualShareOutcome::Updated(patient));
        };

        // Sessions for this grantee are superseded whatever the new status is.
        let superseded = self
            .repository
            .delete_sessions(patient_id, SessionType::Clinician, Some(&share.id_user))
            .await?;

        if share.status != ShareStatus::Accepted {
            self.issuer.enqueue_revocations(superseded);
            return Ok(IndividualShareOutcome::Updated(patient));
        }

        let user_info = self.user_info(&share.id_user).await?;
        let session = Session::new(SessionType::Clinician, &share.id_user, patient_id);
        let claims = json!({
            "given_patient": self.codec.encode(patient_id),
            "given_to": share.id_user,
            "user_name": user_info.user_name,
            "user_lastName": user_info.last_name,
            "user_email": user_info.email,
            "infoPermissions": permissions_text(&share.data),
            "notes": share.notes,
            "id": session.id,
        });

        match self.issuer.issue(session, claims).await {
            Ok(session) => Ok(IndividualShareOutcome::Issued { patient, session }),
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, "Clinician credential issuance failed: {}", e);
                Ok(IndividualShareOutcome::Updated(patient))
            }
        }
    }

    async fn user_info(&self, encoded_user_id: &str) -> Result<UserInfo> {
        let Ok(user_id) = self.codec.decode(encoded_user_id) else {
            return Ok(UserInfo::default());
        };
        Ok(self
            .repository
            .get_user(&user_id)
            .await?
            .map(|user| UserInfo {
                user_name: user.user_name,
                last_name: user.last_name,
                email: user.email,
            })
            .unwrap_or_default())
    }
}

fn permissions_text(data: &Capabilities) -> String {
    let scope = match (data.patient_info, data.medical_info) {
        (true, true) => {
            "personal data of the patient and medical information such as documents, seizures, drugs, symptoms, etc."
        }
        (false, true) => "medical information such as documents, seizures, drugs, symptoms, etc.",
        (true, false) => "personal data of the patient.",
        (false, false) => "no data.",
    };
    format!("I give access to {}", scope)
}
