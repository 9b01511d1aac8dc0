use serde::Deserialize;

use super::{normalize_email, optional_text, require_email, require_phone, require_text, ValidationError};
use crate::model::UserRole;

/// Admin-provisioned account. Credentials live with the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub role: UserRole,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, 100)?;
        require_email(&self.email)?;
        if let Some(phone) = &self.phone {
            require_phone("phone", phone)?;
        }
        optional_text("avatar", self.avatar.as_deref(), 500)
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

impl UserProfileUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, 100)?;
        }
        if let Some(phone) = &self.phone {
            require_phone("phone", phone)?;
        }
        optional_text("avatar", self.avatar.as_deref(), 500)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_validation() {
        let user: NewUser = serde_json::from_value(serde_json::json!({
            "role": "worker",
            "name": "Lan",
            "email": " Lan@Example.VN ",
            "phone": "0901234567"
        }))
        .unwrap();
        assert!(user.validate().is_ok());
        assert_eq!(user.normalized_email(), "lan@example.vn");

        let bad = NewUser { phone: Some("12".into()), ..user };
        assert!(bad.validate().is_err());
    }
}
