use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Module;
use crate::enums::ProgressStatus;

/// Progress of one enrollment through one module. Created lazily on first
/// start; a missing record means `not_started`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ModuleProgress {
    pub id: String,
    pub enrollment_id: String,
    pub module_id: String,
    pub status: ProgressStatus,
    pub score: Option<f64>,
    /// Number of scored completions.
    pub attempts: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A module of the enrolled course together with its progress record, if any.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ModuleState {
    pub module: Module,
    pub progress: Option<ModuleProgress>,
}

impl ModuleState {
    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.progress
            .as_ref()
            .map_or(ProgressStatus::NotStarted, |p| p.status)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status() == ProgressStatus::Completed
    }
}
