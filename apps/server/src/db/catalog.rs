//! Groups, questionnaire definitions and users

use super::{Collection, Repository};
use crate::models::{Group, Questionnaire, User};
use crate::Result;

impl Repository {
    pub async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        self.get(Collection::Groups, id).await
    }

    pub async fn save_group(&self, group: &Group) -> Result<()> {
        self.upsert(Collection::Groups, &group.id, None, group).await?;
        Ok(())
    }

    pub async fn get_questionnaire(&self, id: &str) -> Result<Option<Questionnaire>> {
        self.get(Collection::Questionnaires, id).await
    }

    pub async fn save_questionnaire(&self, questionnaire: &Questionnaire) -> Result<()> {
        self.upsert(Collection::Questionnaires, &questionnaire.id, None, questionnaire)
            .await?;
        Ok(())
    }

    /// Definitions for the given ids; unknown ids are skipped.
    pub async fn questionnaires(&self, ids: &[String]) -> Result<Vec<Questionnaire>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(questionnaire) = self.get_questionnaire(id).await? {
                found.push(questionnaire);
            }
        }
        Ok(found)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.get(Collection::Users, id).await
    }

    pub async fn save_user(&self, user: &User) -> Result<()> {
        self.upsert(Collection::Users, &user.id, None, user).await?;
        Ok(())
    }
}
