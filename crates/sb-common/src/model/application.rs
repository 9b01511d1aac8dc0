use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::application::ApplicationStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: i64,
    pub worker_id: i64,
    pub shift_date_id: i64,
    pub status: ApplicationStatus,
    pub note: Option<String>,
    pub decided_by: Option<i64>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
