use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Admin,
    Employer,
    Worker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub role: UserRole,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_storage_text() {
        for role in [UserRole::Admin, UserRole::Employer, UserRole::Worker] {
            assert_eq!(UserRole::from_str(role.as_ref()).unwrap(), role);
        }
        assert!(UserRole::from_str("Admin").is_err());
        assert_eq!(serde_json::to_string(&UserRole::Employer).unwrap(), "\"employer\"");
    }
}
