use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A cohort of learners, optionally bound to one course and bounded by a
/// capacity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub organization_id: String,
    pub course_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// `None` means unlimited.
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seat usage of a group at the time of the query.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct GroupOccupancy {
    pub group_id: String,
    pub capacity: Option<i64>,
    /// Enrollments neither waitlisted nor cancelled.
    pub occupied: i64,
    pub waitlisted: i64,
}

impl GroupOccupancy {
    /// Seats left, or `None` when the group is unlimited.
    #[must_use]
    pub fn free_seats(&self) -> Option<i64> {
        self.capacity.map(|cap| (cap - self.occupied).max(0))
    }
}
