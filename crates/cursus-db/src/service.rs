//! Service layer hosting every engine operation.
//!
//! `CursusService` wraps `CursusDb` (raw database access) together with the
//! clock and the enrollment policy taken from configuration. All repo methods
//! are implemented as `impl CursusService` blocks under `repos/`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cursus_config::CursusConfig;
use cursus_core::clock::{Clock, SystemClock};

use crate::CursusDb;
use crate::error::DatabaseError;

/// Orchestrates database mutations with audit trail.
///
/// Every mutation method follows this protocol:
/// 1. Lock the connection and open an IMMEDIATE transaction
/// 2. Validate references inside the organization
/// 3. Execute SQL
/// 4. Append the audit entry inside the same transaction
/// 5. Commit, or roll back on any error
///
/// Share one service across tasks behind an `Arc`; its operations queue on
/// the connection lock. Services opened on the same database file
/// coordinate through SQLite's write lock.
pub struct CursusService {
    db: CursusDb,
    clock: Arc<dyn Clock>,
    default_limit: u32,
    allow_reenroll_cancelled: bool,
}

impl CursusService {
    /// Default page size when no configuration is supplied.
    pub const DEFAULT_LIMIT: u32 = 50;

    /// Create a new service wrapping a local database with default policy.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        let db = CursusDb::open_local(db_path).await?;
        Ok(Self::from_db(db))
    }

    /// Create a service from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the configured database cannot be opened.
    pub async fn from_config(config: &CursusConfig) -> Result<Self, DatabaseError> {
        let db = CursusDb::open_local(&config.database.path).await?;
        Ok(Self {
            db,
            clock: Arc::new(SystemClock),
            default_limit: config.general.default_limit,
            allow_reenroll_cancelled: config.enrollment.allow_reenroll_cancelled,
        })
    }

    /// Create from an existing `CursusDb` (for testing).
    #[must_use]
    pub fn from_db(db: CursusDb) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            default_limit: Self::DEFAULT_LIMIT,
            allow_reenroll_cancelled: false,
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Allow `enroll` to reuse a cancelled enrollment row.
    #[must_use]
    pub const fn with_reenroll_cancelled(mut self, allow: bool) -> Self {
        self.allow_reenroll_cancelled = allow;
        self
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &CursusDb {
        &self.db
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn default_limit(&self) -> u32 {
        self.default_limit
    }

    #[must_use]
    pub const fn allows_reenroll_cancelled(&self) -> bool {
        self.allow_reenroll_cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cursus_core::clock::FixedClock;

    #[tokio::test]
    async fn new_local_uses_defaults() {
        let svc = CursusService::new_local(":memory:").await.unwrap();
        assert_eq!(svc.default_limit(), CursusService::DEFAULT_LIMIT);
        assert!(!svc.allows_reenroll_cancelled());
    }

    #[tokio::test]
    async fn from_config_applies_policy() {
        let mut config = CursusConfig::default();
        config.database.path = ":memory:".into();
        config.general.default_limit = 7;
        config.enrollment.allow_reenroll_cancelled = true;

        let svc = CursusService::from_config(&config).await.unwrap();
        assert_eq!(svc.default_limit(), 7);
        assert!(svc.allows_reenroll_cancelled());
    }

    #[tokio::test]
    async fn injected_clock_drives_now() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let svc = CursusService::new_local(":memory:")
            .await
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(at)));
        assert_eq!(svc.now(), at);
    }
}
