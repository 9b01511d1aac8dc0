use serde::Deserialize;

use super::{optional_text, require_email, require_phone, require_text, ValidationError};
use crate::model::{MemberRole, OrganizationLevel, SocialLink, VerificationDocument};
use crate::slug::is_valid_slug;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub industry_id: i64,
    pub address: String,
    pub province_code: String,
    pub district_code: String,
    pub ward_code: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub contact_phone: String,
    pub email: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub social_links: Vec<SocialLink>,
    #[serde(default)]
    pub tax_code: Option<String>,
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ValidationError> {
    if matches!(latitude, Some(lat) if !(-90.0..=90.0).contains(&lat)) {
        return Err(ValidationError::new("latitude must be between -90 and 90"));
    }
    if matches!(longitude, Some(lng) if !(-180.0..=180.0).contains(&lng)) {
        return Err(ValidationError::new("longitude must be between -180 and 180"));
    }
    Ok(())
}

impl NewOrganization {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, 200)?;
        if let Some(slug) = &self.slug {
            if !is_valid_slug(slug) {
                return Err(ValidationError::new(
                    "slug must be lowercase letters and digits separated by single dashes",
                ));
            }
        }
        optional_text("description", self.description.as_deref(), 5000)?;
        require_text("address", &self.address, 300)?;
        require_text("province_code", &self.province_code, 20)?;
        require_text("district_code", &self.district_code, 20)?;
        require_text("ward_code", &self.ward_code, 20)?;
        validate_coordinates(self.latitude, self.longitude)?;
        require_phone("contact_phone", &self.contact_phone)?;
        require_email(&self.email)?;
        optional_text("tax_code", self.tax_code.as_deref(), 20)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub industry_id: Option<i64>,
    pub address: Option<String>,
    pub province_code: Option<String>,
    pub district_code: Option<String>,
    pub ward_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact_phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub social_links: Option<Vec<SocialLink>>,
    pub tax_code: Option<String>,
}

impl OrganizationUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, 200)?;
        }
        optional_text("description", self.description.as_deref(), 5000)?;
        if let Some(address) = &self.address {
            require_text("address", address, 300)?;
        }
        validate_coordinates(self.latitude, self.longitude)?;
        if let Some(phone) = &self.contact_phone {
            require_phone("contact_phone", phone)?;
        }
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        optional_text("tax_code", self.tax_code.as_deref(), 20)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationFilter {
    pub search: Option<String>,
    pub industry_id: Option<i64>,
    pub province_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSubmission {
    pub documents: Vec<VerificationDocument>,
}

impl VerificationSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.documents.is_empty() {
            return Err(ValidationError::new("at least one verification document is required"));
        }
        if self.documents.len() > 10 {
            return Err(ValidationError::new("at most 10 verification documents are accepted"));
        }
        for doc in &self.documents {
            require_text("document kind", &doc.kind, 50)?;
            require_text("document url", &doc.url, 500)?;
        }
        Ok(())
    }
}

/// Admin decision on a pending verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum VerificationReview {
    Approve { level: OrganizationLevel },
    Reject { note: String },
}

impl VerificationReview {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Approve { level } if *level == OrganizationLevel::Unverified => Err(
                ValidationError::new("an approved organization must be level 1 or 2"),
            ),
            Self::Reject { note } => require_text("note", note, 1000),
            Self::Approve { .. } => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub user_id: i64,
    #[serde(default = "default_member_role")]
    pub role: MemberRole,
}

fn default_member_role() -> MemberRole {
    MemberRole::Staff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> NewOrganization {
        serde_json::from_value(serde_json::json!({
            "name": "Cà phê Đà Lạt",
            "industry_id": 1,
            "address": "12 Lê Lợi",
            "province_code": "79",
            "district_code": "760",
            "ward_code": "26734",
            "contact_phone": "0901234567",
            "email": "hello@caphe.vn"
        }))
        .unwrap()
    }

    #[test]
    fn minimal_organization_is_valid() {
        assert!(org().validate().is_ok());
    }

    #[test]
    fn rejects_bad_slug_and_coordinates() {
        let bad_slug = NewOrganization { slug: Some("Bad Slug".into()), ..org() };
        assert!(bad_slug.validate().is_err());
        let bad_lat = NewOrganization { latitude: Some(91.0), ..org() };
        assert!(bad_lat.validate().is_err());
    }

    #[test]
    fn review_decisions() {
        let approve: VerificationReview =
            serde_json::from_value(serde_json::json!({"decision": "approve", "level": 1})).unwrap();
        assert!(approve.validate().is_ok());
        let level_zero: VerificationReview =
            serde_json::from_value(serde_json::json!({"decision": "approve", "level": 0})).unwrap();
        assert!(level_zero.validate().is_err());
        let reject: VerificationReview =
            serde_json::from_value(serde_json::json!({"decision": "reject", "note": ""})).unwrap();
        assert!(reject.validate().is_err());
    }
}
