use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// How an organization regards a worker it has dealt with before.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Favorite,
    Normal,
    /// Only offered when favorites and normal workers cannot fill a shift.
    Restricted,
    /// Cannot apply and never appears in candidate lists.
    Blocked,
}

impl RelationshipType {
    /// Candidate ordering tier; lower is offered first. `None` for blocked.
    pub fn tier(self) -> Option<u8> {
        match self {
            Self::Favorite => Some(0),
            Self::Normal => Some(1),
            Self::Restricted => Some(2),
            Self::Blocked => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRelationship {
    pub id: i64,
    pub organization_id: i64,
    pub worker_id: i64,
    pub relationship_type: RelationshipType,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
