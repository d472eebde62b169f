//! Cross-cutting error types for Cursus.
//!
//! Storage-level errors (`DatabaseError`) live in `cursus-db`. This module
//! holds the stable error kinds every layer maps its errors onto, plus the
//! validation error raised while parsing domain values.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable classification of an engine failure.
///
/// The first five kinds are expected outcomes callers branch on. `Internal`
/// covers storage failures and is never produced by a domain rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyEnrolled,
    Blocked,
    Conflict,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::AlreadyEnrolled => "already_enrolled",
            Self::Blocked => "blocked",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }

    /// Whether this kind is an expected domain outcome rather than a failure
    /// of the backing store.
    #[must_use]
    pub const fn is_domain(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating domain values outside of storage.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value failed validation (unknown enum string, bad format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidInput,
            Self::Other(_) => ErrorKind::Internal,
        }
    }
}
