use serde::Deserialize;

use super::ValidationError;
use crate::model::{Gender, IdentityType, ProfileStatus};
use crate::schedule::availability::{Availability, AvailabilitySet};

const MAX_PREFERENCES: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerProfileInput {
    #[serde(default)]
    pub preferred_positions: Vec<i64>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default)]
    pub expected_salary: i64,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub availability: Vec<Availability>,
}

fn validate_preferences(
    positions: Option<&[i64]>,
    locations: Option<&[String]>,
    expected_salary: Option<i64>,
) -> Result<(), ValidationError> {
    if positions.map_or(false, |p| p.len() > MAX_PREFERENCES)
        || locations.map_or(false, |l| l.len() > MAX_PREFERENCES)
    {
        return Err(ValidationError(format!(
            "at most {MAX_PREFERENCES} preferred positions and locations"
        )));
    }
    if locations.map_or(false, |l| l.iter().any(|code| code.trim().is_empty())) {
        return Err(ValidationError::new("preferred locations must not be blank"));
    }
    if matches!(expected_salary, Some(s) if s < 0) {
        return Err(ValidationError::new("expected_salary must not be negative"));
    }
    Ok(())
}

impl WorkerProfileInput {
    pub fn validate(&self) -> Result<AvailabilitySet, ValidationError> {
        validate_preferences(
            Some(&self.preferred_positions),
            Some(&self.preferred_locations),
            Some(self.expected_salary),
        )?;
        AvailabilitySet::new(&self.availability).map_err(|e| ValidationError(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerPreferencesUpdate {
    pub preferred_positions: Option<Vec<i64>>,
    pub preferred_locations: Option<Vec<String>>,
    pub expected_salary: Option<i64>,
    pub gender: Option<Gender>,
    /// Workers may hide their profile; suspension is admin-only.
    pub status: Option<ProfileStatus>,
}

impl WorkerPreferencesUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_preferences(
            self.preferred_positions.as_deref(),
            self.preferred_locations.as_deref(),
            self.expected_salary,
        )?;
        if self.status == Some(ProfileStatus::Suspended) {
            return Err(ValidationError::new("a worker cannot suspend their own profile"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityReplace {
    pub availability: Vec<Availability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySubmission {
    pub identity_type: IdentityType,
    pub images: Vec<String>,
}

impl IdentitySubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.images.is_empty() || self.images.len() > 4 {
            return Err(ValidationError::new("between 1 and 4 identity images are required"));
        }
        if self.images.iter().any(|url| url.trim().is_empty()) {
            return Err(ValidationError::new("identity image urls must not be blank"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum IdentityReview {
    Approve,
    Reject { reason: String },
}

impl IdentityReview {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Approve => Ok(()),
            Self::Reject { reason } => super::require_text("reason", reason, 500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_input_validates_availability() {
        let input: WorkerProfileInput = serde_json::from_value(serde_json::json!({
            "preferred_positions": [1, 2],
            "expected_salary": 200000,
            "availability": [
                {"type": "WEEKLY_PATTERN", "weeklyPattern": [
                    {"day": "MONDAY", "from": "09:00", "to": "12:00"},
                    {"day": "MONDAY", "from": "11:00", "to": "13:00"}
                ]}
            ]
        }))
        .unwrap();
        let err = input.validate().unwrap_err();
        assert!(err.0.contains("overlapping"));
    }

    #[test]
    fn workers_cannot_self_suspend() {
        let update = WorkerPreferencesUpdate { status: Some(ProfileStatus::Suspended), ..Default::default() };
        assert!(update.validate().is_err());
        let hide = WorkerPreferencesUpdate { status: Some(ProfileStatus::Private), ..Default::default() };
        assert!(hide.validate().is_ok());
    }

    #[test]
    fn negative_salary_is_rejected() {
        let update = WorkerPreferencesUpdate { expected_salary: Some(-1), ..Default::default() };
        assert!(update.validate().is_err());
    }
}
