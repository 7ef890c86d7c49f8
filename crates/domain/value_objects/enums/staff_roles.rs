use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    User,
}

impl StaffRole {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(StaffRole::Admin),
            "user" => Some(StaffRole::User),
            _ => None,
        }
    }
}

impl Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            StaffRole::Admin => "admin",
            StaffRole::User => "user",
        };
        write!(f, "{}", role)
    }
}
