//! Organizations and their catalogs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Drug {
    pub id: String,
    pub name: String,
    pub snomed: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub drugs: Vec<Drug>,
    /// Ids of the questionnaires the group's patients answer.
    pub questionnaires: Vec<String>,
}

impl Group {
    pub fn find_drug(&self, name: &str) -> Option<&Drug> {
        self.drugs
            .iter()
            .find(|drug| drug.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerOption {
    pub value: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionnaireItem {
    pub id_prom: String,
    pub text: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub answers: Vec<AnswerOption>,
    /// Option value that carries free text, if any.
    pub other: Option<String>,
}

impl QuestionnaireItem {
    pub fn is_choice_set(&self) -> bool {
        self.item_type == "ChoiceSet"
    }
}

/// Immutable questionnaire definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Questionnaire {
    pub id: String,
    pub title: String,
    pub items: Vec<QuestionnaireItem>,
}

impl Questionnaire {
    pub fn item(&self, id_prom: &str) -> Option<&QuestionnaireItem> {
        self.items.iter().find(|item| item.id_prom == id_prom)
    }
}
