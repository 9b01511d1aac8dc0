use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::worker::Gender;
use crate::schedule::expander::ShiftTemplate;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GenderRequirement {
    Male,
    Female,
    #[default]
    Any,
}

impl GenderRequirement {
    /// `None` when the worker's gender is unknown and the requirement is
    /// specific.
    pub fn accepts(self, gender: Option<Gender>) -> Option<bool> {
        match (self, gender) {
            (Self::Any, _) => Some(true),
            (_, None) => None,
            (Self::Male, Some(g)) => Some(g == Gender::Male),
            (Self::Female, Some(g)) => Some(g == Gender::Female),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftTemplateRecord {
    pub id: i64,
    pub job_id: i64,
    #[serde(flatten)]
    pub template: ShiftTemplate,
    pub created_at: DateTime<Utc>,
}

/// One dated occurrence of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftDate {
    pub id: i64,
    pub template_id: i64,
    pub shift_date: NaiveDate,
    pub quantity: i32,
    pub gender_requirement: GenderRequirement,
    pub salary_override: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everyone() {
        assert_eq!(GenderRequirement::Any.accepts(None), Some(true));
        assert_eq!(GenderRequirement::Any.accepts(Some(Gender::Other)), Some(true));
    }

    #[test]
    fn specific_requirement_needs_known_gender() {
        assert_eq!(GenderRequirement::Female.accepts(None), None);
        assert_eq!(GenderRequirement::Female.accepts(Some(Gender::Female)), Some(true));
        assert_eq!(GenderRequirement::Male.accepts(Some(Gender::Female)), Some(false));
    }
}
