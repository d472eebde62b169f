//! Typed audit detail payloads.
//!
//! Each audit action can carry a structured `detail` JSON blob. These types
//! give the common shapes a schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Detail for `AuditAction::StatusChanged`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StatusChangedDetail {
    pub from: String,
    pub to: String,
    pub reason: Option<String>,
}

/// Detail for `AuditAction::Admitted` and `AuditAction::Waitlisted`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AdmissionDetail {
    pub course_id: String,
    pub learner_id: String,
    pub group_id: Option<String>,
    pub status: String,
}

/// Detail for `AuditAction::Reordered`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ReorderedDetail {
    pub module_ids: Vec<String>,
    /// Modules whose position actually changed.
    pub moved: u32,
}

/// Detail for `AuditAction::ModuleStarted` and `AuditAction::ModuleCompleted`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ModuleProgressDetail {
    pub enrollment_id: String,
    pub module_id: String,
    pub score: Option<f64>,
    pub attempts: i64,
}

/// Detail for `AuditAction::ProgressRecomputed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProgressRecomputedDetail {
    pub completed_modules: i64,
    pub total_modules: i64,
    pub progress: f64,
}

/// Detail for `AuditAction::Deleted` on a course.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CourseDeletedDetail {
    pub modules: u64,
    pub enrollments: u64,
    pub progress_records: u64,
    pub groups_detached: u64,
}
