//! Enrollment update builder.
//!
//! This is the administrative override path: status and progress are set
//! independently and are not reconciled with module progress.

use chrono::{DateTime, Utc};
use cursus_core::enums::EnrollmentStatus;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrollmentUpdate {
    /// Setting `active` without an explicit `started_at` stamps the current time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EnrollmentStatus>,
    /// Clamped to `[0, 100]`. Reaching 100 without an explicit `completed_at`
    /// stamps the current time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Option<serde_json::Value>>,
}

pub struct EnrollmentUpdateBuilder(EnrollmentUpdate);

impl EnrollmentUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(EnrollmentUpdate::default())
    }

    #[must_use]
    pub const fn status(mut self, status: EnrollmentStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub const fn progress(mut self, progress: f64) -> Self {
        self.0.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn group_id(mut self, group_id: Option<String>) -> Self {
        self.0.group_id = Some(group_id);
        self
    }

    #[must_use]
    pub const fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.0.started_at = Some(started_at);
        self
    }

    #[must_use]
    pub const fn completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.0.completed_at = Some(completed_at);
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.0.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn build(self) -> EnrollmentUpdate {
        self.0
    }
}

impl Default for EnrollmentUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
