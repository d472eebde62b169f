use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ModuleStatus, ModuleType};

/// A unit of a course. `position` is the module's rank in the prerequisite
/// chain; ranks are unique per course and may have gaps after removals.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub module_type: ModuleType,
    pub position: i64,
    pub duration_seconds: Option<i64>,
    pub status: ModuleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
