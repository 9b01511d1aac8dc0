use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::model::RelationshipType;
use crate::schedule::time::ShiftInterval;

/// Widest date range a worker may scan for open shifts.
pub const MAX_ELIGIBLE_RANGE_DAYS: i64 = 62;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EligibleShiftQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EligibleShiftQuery {
    /// Resolves open bounds against `today` (default: the next 14 days).
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ValidationError> {
        let from = self.from.unwrap_or(today).max(today);
        let to = self.to.unwrap_or(from + chrono::Duration::days(14));
        if to < from {
            return Err(ValidationError::new("to must not be before from"));
        }
        if (to - from).num_days() > MAX_ELIGIBLE_RANGE_DAYS {
            return Err(ValidationError(format!(
                "date range must be at most {MAX_ELIGIBLE_RANGE_DAYS} days"
            )));
        }
        Ok((from, to))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateView {
    pub worker_id: i64,
    pub name: String,
    pub relationship: RelationshipType,
    pub reliability_score: i32,
    pub total_jobs_completed: i32,
    pub needs_review: bool,
    pub review_reasons: Vec<String>,
    pub has_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibleShiftView {
    pub shift_date_id: i64,
    pub posting_id: i64,
    pub posting_title: String,
    pub organization_id: i64,
    pub position_id: i64,
    pub shift_date: NaiveDate,
    pub interval: ShiftInterval,
    pub salary: i64,
    pub remaining: i32,
    pub needs_review: bool,
    pub review_reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn defaults_to_two_weeks_from_today() {
        let (from, to) = EligibleShiftQuery::default().resolve(date("2030-03-01")).unwrap();
        assert_eq!(from, date("2030-03-01"));
        assert_eq!(to, date("2030-03-15"));
    }

    #[test]
    fn clamps_past_start_and_caps_range() {
        let query = EligibleShiftQuery { from: Some(date("2030-02-01")), to: Some(date("2030-03-05")) };
        assert_eq!(query.resolve(date("2030-03-01")).unwrap().0, date("2030-03-01"));

        let wide = EligibleShiftQuery { from: None, to: Some(date("2030-06-01")) };
        assert!(wide.resolve(date("2030-03-01")).is_err());
    }
}
