use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{optional_text, require_text, ValidationError};
use crate::model::{Job, JobPosting, JobPostingStatus, Location};
use crate::schedule::expander::ActiveWindow;

#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub position_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPosting {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
    pub jobs: Vec<NewJob>,
}

impl NewPosting {
    pub fn window(&self) -> ActiveWindow {
        ActiveWindow { starts_on: self.starts_on, ends_on: self.ends_on }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, 200)?;
        optional_text("description", self.description.as_deref(), 10_000)?;
        optional_text("requirements", self.requirements.as_deref(), 5000)?;
        optional_text("benefits", self.benefits.as_deref(), 5000)?;
        if !self.window().is_valid() {
            return Err(ValidationError::new("starts_on must not be after ends_on"));
        }
        if self.jobs.is_empty() {
            return Err(ValidationError::new("a posting needs at least one job"));
        }
        if self.jobs.len() > 20 {
            return Err(ValidationError::new("a posting can have at most 20 jobs"));
        }
        Ok(())
    }
}

/// Partial update. Window bounds are removed with `clear_starts_on` /
/// `clear_ends_on`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub province_code: Option<String>,
    pub district_code: Option<String>,
    pub ward_code: Option<String>,
    pub address: Option<String>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    #[serde(default)]
    pub clear_starts_on: bool,
    #[serde(default)]
    pub clear_ends_on: bool,
}

impl PostingUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_text("title", title, 200)?;
        }
        optional_text("description", self.description.as_deref(), 10_000)?;
        if (self.clear_starts_on && self.starts_on.is_some())
            || (self.clear_ends_on && self.ends_on.is_some())
        {
            return Err(ValidationError::new("cannot both set and clear a window bound"));
        }
        Ok(())
    }

    /// Window after applying this update to `current`; refused when the
    /// merged bounds end up inverted.
    pub fn apply_window(&self, current: ActiveWindow) -> Result<ActiveWindow, ValidationError> {
        let pick = |clear: bool, new: Option<NaiveDate>, old: Option<NaiveDate>| {
            if clear {
                None
            } else {
                new.or(old)
            }
        };
        let window = ActiveWindow {
            starts_on: pick(self.clear_starts_on, self.starts_on, current.starts_on),
            ends_on: pick(self.clear_ends_on, self.ends_on, current.ends_on),
        };
        if !window.is_valid() {
            return Err(ValidationError(format!("active window {window} ends before it starts")));
        }
        Ok(window)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostingFilter {
    pub province_code: Option<String>,
    pub position_id: Option<i64>,
    pub organization_id: Option<i64>,
    /// Postings with at least one shift on or after this date.
    pub from: Option<NaiveDate>,
    /// Postings with at least one shift on or before this date.
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl PostingFilter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ValidationError::new("from must not be after to"));
            }
        }
        optional_text("search", self.search.as_deref(), 100)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationPostingFilter {
    pub status: Option<JobPostingStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostingDetail {
    #[serde(flatten)]
    pub posting: JobPosting,
    pub jobs: Vec<Job>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn new_posting_requires_jobs_and_ordered_window() {
        let posting: NewPosting = serde_json::from_value(serde_json::json!({
            "title": "Weekend baristas",
            "province_code": "79",
            "starts_on": "2030-03-01",
            "ends_on": "2030-03-31",
            "jobs": [{"position_id": 4}]
        }))
        .unwrap();
        assert!(posting.validate().is_ok());
        assert_eq!(posting.location.province_code.as_deref(), Some("79"));

        let inverted = NewPosting { starts_on: Some(date("2030-04-01")), ..posting.clone() };
        assert!(inverted.validate().is_err());
        let no_jobs = NewPosting { jobs: vec![], ..posting };
        assert!(no_jobs.validate().is_err());
    }

    #[test]
    fn update_window_merges_with_current() {
        let current = ActiveWindow { starts_on: Some(date("2030-03-01")), ends_on: Some(date("2030-03-31")) };
        let update = PostingUpdate { ends_on: Some(date("2030-04-30")), ..Default::default() };
        assert_eq!(
            update.apply_window(current).unwrap(),
            ActiveWindow { starts_on: Some(date("2030-03-01")), ends_on: Some(date("2030-04-30")) }
        );
        let clear = PostingUpdate { clear_starts_on: true, ..Default::default() };
        assert_eq!(clear.apply_window(current).unwrap().starts_on, None);
    }

    #[test]
    fn update_refuses_a_merged_window_that_ends_before_it_starts() {
        let current = ActiveWindow { starts_on: Some(date("2030-03-01")), ends_on: Some(date("2030-03-10")) };
        let late_start = PostingUpdate { starts_on: Some(date("2030-03-20")), ..Default::default() };
        assert!(late_start.validate().is_ok());
        let err = late_start.apply_window(current).unwrap_err();
        assert!(err.0.contains("[2030-03-20, 2030-03-10]"));

        let early_end = PostingUpdate { ends_on: Some(date("2030-02-15")), ..Default::default() };
        assert!(early_end.apply_window(current).is_err());

        let moved = PostingUpdate {
            starts_on: Some(date("2030-03-20")),
            ends_on: Some(date("2030-03-25")),
            ..Default::default()
        };
        assert!(moved.apply_window(current).is_ok());
        let open_end = PostingUpdate { starts_on: Some(date("2030-03-20")), clear_ends_on: true, ..Default::default() };
        assert!(open_end.apply_window(current).is_ok());
    }
}
