//! Seed data helpers

use super::TestApp;
use chrono::{DateTime, TimeZone, Utc};
use raito::models::{
    new_id, Capabilities, CustomShare, Drug, Feel, Group, IndividualShare, Medication,
    ShareStatus,
};

pub const GROUP_ID: &str = "group-dravet";

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 8, 0, 0).unwrap()
}

pub fn medical_only() -> Capabilities {
    Capabilities {
        medical_info: true,
        ..Default::default()
    }
}

pub fn individual_share(id_user: &str, status: ShareStatus) -> IndividualShare {
    IndividualShare {
        id: new_id(),
        data: medical_only(),
        notes: "neurologist".into(),
        date: Some(day(1)),
        token: String::new(),
        id_user: id_user.to_string(),
        status,
    }
}

pub fn invitation(token: &str) -> CustomShare {
    CustomShare {
        id: new_id(),
        data: medical_only(),
        notes: "school nurse".into(),
        date: Some(day(1)),
        token: format!("https://raito.example/invitation?token={token}"),
    }
}

impl TestApp {
    pub async fn seed_group(&self) -> anyhow::Result<Group> {
        let group = Group {
            id: GROUP_ID.to_string(),
            name: "Dravet Syndrome European Federation".to_string(),
            drugs: vec![Drug {
                id: "drug-valproate".into(),
                name: "Valproate".into(),
                snomed: "387080000".into(),
            }],
            questionnaires: Vec::new(),
        };
        self.state.repository.save_group(&group).await?;
        Ok(group)
    }

    pub async fn seed_medication(
        &self,
        patient_id: &str,
        drug: &str,
        dose: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Medication> {
        let medication = Medication {
            id: new_id(),
            created_by: patient_id.to_string(),
            drug: drug.to_string(),
            dose: dose.to_string(),
            start_date: Some(start),
            end_date: end,
            notes: String::new(),
            date: Some(start),
        };
        self.state.repository.insert_medication(&medication).await?;
        Ok(medication)
    }

    pub async fn seed_feel(&self, patient_id: &str, scores: [i32; 3]) -> anyhow::Result<Feel> {
        let feel = Feel {
            id: new_id(),
            created_by: patient_id.to_string(),
            a1: scores[0],
            a2: scores[1],
            a3: scores[2],
            note: String::new(),
            date: Some(day(5)),
        };
        self.state.repository.insert_feel(&feel).await?;
        Ok(feel)
    }
}
