use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::schedule::availability::Availability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileStatus {
    Public,
    Private,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    CitizenId,
    StudentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

pub const MIN_RELIABILITY_SCORE: i32 = 0;
pub const MAX_RELIABILITY_SCORE: i32 = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerProfile {
    pub user_id: i64,
    pub preferred_positions: Vec<i64>,
    pub preferred_locations: Vec<String>,
    pub expected_salary: i64,
    pub gender: Option<Gender>,
    pub availability: Vec<Availability>,
    pub status: ProfileStatus,
    pub is_identity_verified: bool,
    pub identity_type: Option<IdentityType>,
    pub identity_images: Vec<String>,
    pub identity_reject_reason: Option<String>,
    pub reliability_score: i32,
    pub total_jobs_completed: i32,
    pub no_show_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
