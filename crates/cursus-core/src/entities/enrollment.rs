use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::EnrollmentStatus;

/// Membership of one learner in one course, unique per
/// (organization, course, learner).
///
/// `progress` is derived from module progress by the aggregator; treat it as
/// eventually consistent with the module records, never as a second source
/// of truth.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Enrollment {
    pub id: String,
    pub organization_id: String,
    pub course_id: String,
    pub learner_id: String,
    pub group_id: Option<String>,
    pub status: EnrollmentStatus,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
