//! Access audit log

use super::{Collection, Repository};
use crate::models::AccessRecord;
use crate::Result;

impl Repository {
    pub async fn insert_access_record(&self, record: &AccessRecord) -> Result<()> {
        self.insert(Collection::AccessLog, &record.id, Some(&record.created_by), record)
            .await?;
        Ok(())
    }

    pub async fn access_records(&self, patient_id: &str) -> Result<Vec<AccessRecord>> {
        self.list(Collection::AccessLog, patient_id).await
    }
}
