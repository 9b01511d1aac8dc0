use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    None,
    Pending,
    Verified,
    Rejected,
}

/// Verification tier. Level 0 organizations can keep only a handful of
/// postings live at once; level 2 has no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum OrganizationLevel {
    Unverified,
    Verified,
    Trusted,
}

impl OrganizationLevel {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Unverified => 0,
            Self::Verified => 1,
            Self::Trusted => 2,
        }
    }

    /// Maximum number of simultaneously published postings.
    pub fn published_posting_quota(self) -> Option<i64> {
        match self {
            Self::Unverified => Some(3),
            Self::Verified => Some(20),
            Self::Trusted => None,
        }
    }
}

impl TryFrom<i16> for OrganizationLevel {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unverified),
            1 => Ok(Self::Verified),
            2 => Ok(Self::Trusted),
            other => Err(format!("unknown organization level {other}")),
        }
    }
}

impl From<OrganizationLevel> for i16 {
    fn from(level: OrganizationLevel) -> Self {
        level.as_i16()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDocument {
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organization {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub industry_id: i64,
    pub address: String,
    pub province_code: String,
    pub district_code: String,
    pub ward_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact_phone: String,
    pub email: String,
    pub website: Option<String>,
    pub social_links: Vec<SocialLink>,
    pub tax_code: Option<String>,
    pub verification_status: VerificationStatus,
    pub verification_level: OrganizationLevel,
    pub verification_documents: Vec<VerificationDocument>,
    pub review_note: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Staff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationMember {
    pub organization_id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_grows_with_level() {
        assert_eq!(OrganizationLevel::Unverified.published_posting_quota(), Some(3));
        assert_eq!(OrganizationLevel::Verified.published_posting_quota(), Some(20));
        assert_eq!(OrganizationLevel::Trusted.published_posting_quota(), None);
    }

    #[test]
    fn level_serializes_as_number() {
        assert_eq!(serde_json::to_string(&OrganizationLevel::Verified).unwrap(), "1");
        let parsed: OrganizationLevel = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, OrganizationLevel::Trusted);
        assert!(serde_json::from_str::<OrganizationLevel>("3").is_err());
    }
}
