//! Database error types for cursus-db.

use cursus_core::enums::EntityType;
use cursus_core::errors::{CoreError, ErrorKind};
use thiserror::Error;

/// Errors from engine and database operations.
///
/// The first five variants are domain outcomes callers branch on; the rest
/// are storage failures and always map to [`ErrorKind::Internal`].
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Malformed input or a reference that does not resolve inside the tenant.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The addressed entity does not exist within the caller's organization.
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: EntityType, id: String },

    /// An enrollment already exists for this learner and course.
    #[error("Learner {learner_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled {
        course_id: String,
        learner_id: String,
    },

    /// Lower-position modules are not completed yet.
    #[error("Module {module_id} is blocked by incomplete prerequisites: {missing:?}")]
    Blocked {
        module_id: String,
        missing: Vec<String>,
    },

    /// A unique name or slug is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyEnrolled { .. } => ErrorKind::AlreadyEnrolled,
            Self::Blocked { .. } => ErrorKind::Blocked,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Query(_)
            | Self::Migration(_)
            | Self::NoResult
            | Self::InvalidState(_)
            | Self::LibSql(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity_type: EntityType, id: &str) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }
}

impl From<CoreError> for DatabaseError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => Self::InvalidInput(msg),
            CoreError::Other(e) => Self::Other(e),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DatabaseError::InvalidInput("x".into()), ErrorKind::InvalidInput)]
    #[case(DatabaseError::not_found(EntityType::Course, "crs-1"), ErrorKind::NotFound)]
    #[case(
        DatabaseError::AlreadyEnrolled { course_id: "crs-1".into(), learner_id: "lrn-1".into() },
        ErrorKind::AlreadyEnrolled
    )]
    #[case(
        DatabaseError::Blocked { module_id: "mod-2".into(), missing: vec!["mod-1".into()] },
        ErrorKind::Blocked
    )]
    #[case(DatabaseError::Conflict("slug".into()), ErrorKind::Conflict)]
    #[case(DatabaseError::NoResult, ErrorKind::Internal)]
    #[case(DatabaseError::Query("boom".into()), ErrorKind::Internal)]
    fn kind_mapping(#[case] error: DatabaseError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn validation_maps_to_invalid_input() {
        let err: DatabaseError = CoreError::Validation("unknown module type 'x'".into()).into();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = DatabaseError::not_found(EntityType::Enrollment, "enr-deadbeef");
        assert_eq!(err.to_string(), "enrollment enr-deadbeef not found");
    }
}
