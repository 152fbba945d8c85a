//! Platform users

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    User,
    Clinical,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Staff roles act on any patient; `User` only on their own.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::User)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}
