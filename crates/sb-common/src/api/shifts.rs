use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::model::{GenderRequirement, ShiftDate};
use crate::schedule::expander::ShiftTemplate;
use crate::schedule::time::ShiftInterval;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NewShiftTemplate {
    pub start_hour: i16,
    pub end_hour: i16,
    pub salary: i64,
}

impl NewShiftTemplate {
    pub fn validate(&self) -> Result<ShiftTemplate, ValidationError> {
        ShiftTemplate::new(self.start_hour, self.end_hour, self.salary)
            .map_err(|e| ValidationError(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShiftDemandUpdate {
    pub quantity: Option<i32>,
    pub gender_requirement: Option<GenderRequirement>,
    pub salary_override: Option<i64>,
    #[serde(default)]
    pub clear_salary_override: bool,
}

impl ShiftDemandUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(self.quantity, Some(q) if q < 1) {
            return Err(ValidationError::new("quantity must be at least 1"));
        }
        if matches!(self.salary_override, Some(s) if s <= 0) {
            return Err(ValidationError::new("salary override must be positive"));
        }
        if self.clear_salary_override && self.salary_override.is_some() {
            return Err(ValidationError::new("cannot both set and clear the salary override"));
        }
        Ok(())
    }

    /// The requested quantity when it would drop below `accepted` workers.
    pub fn quantity_below(&self, accepted: i32) -> Option<i32> {
        self.quantity.filter(|requested| *requested < accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionOutcome {
    pub created: Vec<ShiftDate>,
    pub skipped: Vec<NaiveDate>,
}

/// Shift date as listed under a posting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftDateView {
    #[serde(flatten)]
    pub shift: ShiftDate,
    pub job_id: i64,
    pub position_id: i64,
    pub start_hour: i16,
    pub end_hour: i16,
    pub salary: i64,
    pub interval: ShiftInterval,
    pub accepted_count: i64,
    pub pending_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_input_reuses_domain_rules() {
        let ok = NewShiftTemplate { start_hour: 22, end_hour: 6, salary: 300_000 };
        assert!(ok.validate().unwrap().is_overnight());
        let bad = NewShiftTemplate { start_hour: 9, end_hour: 9, salary: 300_000 };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn demand_update_rules() {
        assert!(ShiftDemandUpdate { quantity: Some(0), ..Default::default() }.validate().is_err());
        assert!(ShiftDemandUpdate { quantity: Some(3), ..Default::default() }.validate().is_ok());
        assert!(ShiftDemandUpdate { salary_override: Some(1), clear_salary_override: true, ..Default::default() }
            .validate()
            .is_err());
    }

    #[test]
    fn quantity_cannot_drop_below_accepted_workers() {
        let lower = ShiftDemandUpdate { quantity: Some(2), ..Default::default() };
        assert_eq!(lower.quantity_below(3), Some(2));
        assert_eq!(lower.quantity_below(2), None);
        assert_eq!(lower.quantity_below(0), None);
        let untouched = ShiftDemandUpdate { salary_override: Some(350_000), ..Default::default() };
        assert_eq!(untouched.quantity_below(5), None);
    }
}
