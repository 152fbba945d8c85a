//! Issuance sessions

use super::{Collection, Repository};
use crate::models::{Session, SessionData, SessionType};
use crate::Result;

impl Repository {
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.get(Collection::Sessions, id).await
    }

    pub async fn sessions_for_patient(&self, patient_id: &str) -> Result<Vec<Session>> {
        self.list(Collection::Sessions, patient_id).await
    }

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        self.insert(Collection::Sessions, &session.id, Some(&session.created_by), session)
            .await?;
        Ok(())
    }

    pub async fn save_session(&self, session: &Session) -> Result<()> {
        self.upsert(Collection::Sessions, &session.id, Some(&session.created_by), session)
            .await?;
        Ok(())
    }

    pub async fn set_session_status(&self, id: &str, data: SessionData) -> Result<Option<Session>> {
        let Some(mut session) = self.get_session(id).await? else {
            return Ok(None);
        };
        session.session_data = data;
        self.save_session(&session).await?;
        Ok(Some(session))
    }

    /// Delete the patient's sessions of `session_type`, optionally only those
    /// shared with `shared_with`. Returns the deleted sessions.
    pub async fn delete_sessions(
        &self,
        patient_id: &str,
        session_type: SessionType,
        shared_with: Option<&str>,
    ) -> Result<Vec<Session>> {
        let mut deleted = Vec::new();
        for session in self.sessions_for_patient(patient_id).await? {
            let matches = session.session_type == session_type
                && shared_with.map_or(true, |target| session.shared_with == target);
            if matches && self.store.delete(Collection::Sessions, &session.id).await? {
                deleted.push(session);
            }
        }
        Ok(deleted)
    }
}
