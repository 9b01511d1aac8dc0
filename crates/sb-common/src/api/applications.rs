use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{optional_text, ValidationError};
use crate::model::Application;
use crate::schedule::application::ApplicationStatus;
use crate::schedule::time::ShiftInterval;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub note: Option<String>,
}

impl ApplyRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        optional_text("note", self.note.as_deref(), 1000)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
}

/// Application with enough shift context to render a list row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub worker_name: String,
    pub posting_id: i64,
    pub posting_title: String,
    pub organization_id: i64,
    pub shift_date: NaiveDate,
    pub interval: ShiftInterval,
}
