use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A member of an organization who can enroll in its courses.
///
/// Mirrors the account record owned by the identity collaborator; only the
/// fields needed for tenant resolution live here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Learner {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
