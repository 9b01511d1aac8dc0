use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::schedule::expander::ActiveWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPostingStatus {
    Draft,
    Published,
    Closed,
    Expired,
}

impl JobPostingStatus {
    /// Draft → Published → Closed/Expired. A draft may also be closed
    /// without ever going live. Closed and expired are final.
    pub fn can_transition_to(self, next: JobPostingStatus) -> bool {
        use JobPostingStatus::*;
        matches!(
            (self, next),
            (Draft, Published) | (Draft, Closed) | (Published, Closed) | (Published, Expired)
        )
    }

    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Published)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub province_code: Option<String>,
    pub district_code: Option<String>,
    pub ward_code: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPosting {
    pub id: i64,
    pub organization_id: i64,
    pub poster_id: i64,
    pub title: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub location: Location,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub published_at: Option<DateTime<Utc>>,
    pub status: JobPostingStatus,
    pub view_count: i64,
    pub application_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobPosting {
    pub fn active_window(&self) -> ActiveWindow {
        ActiveWindow {
            starts_on: self.starts_on,
            ends_on: self.ends_on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: i64,
    pub posting_id: i64,
    pub position_id: i64,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobPostingStatus::*;

    #[test]
    fn posting_lifecycle_is_forward_only() {
        assert!(Draft.can_transition_to(Published));
        assert!(Draft.can_transition_to(Closed));
        assert!(Published.can_transition_to(Expired));
        assert!(!Draft.can_transition_to(Expired));
        assert!(!Closed.can_transition_to(Published));
        assert!(!Expired.can_transition_to(Published));
        assert!(!Published.can_transition_to(Draft));
    }

    #[test]
    fn only_live_postings_are_editable() {
        assert!(Draft.is_editable());
        assert!(Published.is_editable());
        assert!(!Closed.is_editable());
        assert!(!Expired.is_editable());
    }
}
