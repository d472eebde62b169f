//! Status enums, module types, entity types, and audit actions for Cursus.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`
//! and store the same string in SQL. Status enums with state machines provide
//! `allowed_next_states()` to enforce valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// CourseStatus
// ---------------------------------------------------------------------------

/// Publication status of a course.
///
/// ```text
/// draft ⇄ published
///   └──────┴──→ archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ModuleType
// ---------------------------------------------------------------------------

/// Kind of learning material a module delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Scorm,
    Pdf,
    Video,
    Article,
    Quiz,
}

impl ModuleType {
    pub const ALL: &'static [Self] = &[
        Self::Article,
        Self::Pdf,
        Self::Quiz,
        Self::Scorm,
        Self::Video,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scorm => "scorm",
            Self::Pdf => "pdf",
            Self::Video => "video",
            Self::Article => "article",
            Self::Quiz => "quiz",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = CoreError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CoreError::Validation(format!("unknown module type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// ModuleStatus
// ---------------------------------------------------------------------------

/// Presentational status of a module. Archived modules still take part in
/// ordering and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Active,
    Archived,
}

impl ModuleStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EnrollmentStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an enrollment.
///
/// Admission creates `active` or `waitlisted`. The aggregator moves an
/// enrollment to `completed`; `cancel` moves it to `cancelled`. Administrative
/// updates may set any status directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Waitlisted,
}

impl EnrollmentStatus {
    /// Whether an enrollment in this status counts against its group's capacity.
    #[must_use]
    pub const fn occupies_seat(self) -> bool {
        !matches!(self, Self::Waitlisted | Self::Cancelled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Waitlisted => "waitlisted",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProgressStatus
// ---------------------------------------------------------------------------

/// Status of one module for one enrollment.
///
/// ```text
/// not_started → in_progress → completed
///               in_progress → in_progress
///                 completed → completed
///                 completed → in_progress (retake)
/// ```
///
/// Nothing ever returns to `not_started`; that state is only ever implied by
/// the absence of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::NotStarted => &[Self::InProgress],
            Self::InProgress => &[Self::InProgress, Self::Completed],
            Self::Completed => &[Self::InProgress, Self::Completed],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

/// Type of action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    StatusChanged,
    Deleted,
    Reordered,
    Admitted,
    Waitlisted,
    ModuleStarted,
    ModuleCompleted,
    ProgressRecomputed,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::Deleted => "deleted",
            Self::Reordered => "reordered",
            Self::Admitted => "admitted",
            Self::Waitlisted => "waitlisted",
            Self::ModuleStarted => "module_started",
            Self::ModuleCompleted => "module_completed",
            Self::ProgressRecomputed => "progress_recomputed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Type of entity in the system, used in the audit trail and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Organization,
    Learner,
    Course,
    Module,
    Group,
    Enrollment,
    ModuleProgress,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Learner => "learner",
            Self::Course => "course",
            Self::Module => "module",
            Self::Group => "group",
            Self::Enrollment => "enrollment",
            Self::ModuleProgress => "module_progress",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("scorm", ModuleType::Scorm)]
    #[case("PDF", ModuleType::Pdf)]
    #[case("  Video ", ModuleType::Video)]
    #[case("article", ModuleType::Article)]
    #[case("Quiz", ModuleType::Quiz)]
    fn module_type_parses_case_insensitively(#[case] raw: &str, #[case] expected: ModuleType) {
        assert_eq!(raw.parse::<ModuleType>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("podcast")]
    #[case("quizz")]
    fn module_type_rejects_unknown(#[case] raw: &str) {
        let err = raw.parse::<ModuleType>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn module_type_all_is_sorted() {
        let names: Vec<&str> = ModuleType::ALL.iter().map(|t| t.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn seat_occupancy_excludes_waitlisted_and_cancelled() {
        assert!(EnrollmentStatus::Active.occupies_seat());
        assert!(EnrollmentStatus::Pending.occupies_seat());
        assert!(EnrollmentStatus::Completed.occupies_seat());
        assert!(!EnrollmentStatus::Waitlisted.occupies_seat());
        assert!(!EnrollmentStatus::Cancelled.occupies_seat());
    }

    #[test]
    fn progress_never_returns_to_not_started() {
        for status in [
            ProgressStatus::NotStarted,
            ProgressStatus::InProgress,
            ProgressStatus::Completed,
        ] {
            assert!(!status.can_transition_to(ProgressStatus::NotStarted));
        }
        assert!(!ProgressStatus::NotStarted.can_transition_to(ProgressStatus::Completed));
        assert!(ProgressStatus::InProgress.can_transition_to(ProgressStatus::InProgress));
        assert!(ProgressStatus::Completed.can_transition_to(ProgressStatus::Completed));
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&EnrollmentStatus::Waitlisted).unwrap();
        assert_eq!(json, "\"waitlisted\"");
        let json = serde_json::to_string(&ProgressStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        let json = serde_json::to_string(&AuditAction::ModuleCompleted).unwrap();
        assert_eq!(json, format!("\"{}\"", AuditAction::ModuleCompleted.as_str()));
    }
}
