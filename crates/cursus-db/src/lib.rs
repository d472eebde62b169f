//! # cursus-db
//!
//! libSQL-backed enrollment and progress engine for Cursus.
//!
//! Owns all relational state: organizations, learners, the course catalog,
//! groups, enrollments, per-module progress and the audit trail. Every read
//! and write is scoped by organization.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod service;
pub mod updates;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::{Builder, TransactionBehavior};
use tokio::sync::{Mutex, MutexGuard};

/// Central database handle for all Cursus state operations.
///
/// Wraps a libSQL database and its connection. The connection sits behind an
/// async mutex: an operation holds the guard from its first read to its
/// commit, so tasks sharing one handle never interleave statements or
/// transactions. Other handles on the same file coordinate through SQLite
/// locking and `busy_timeout`.
pub struct CursusDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: Mutex<libsql::Connection>,
}

impl CursusDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        configure_connection(&conn).await?;

        let cursus_db = Self {
            db,
            conn: Mutex::new(conn),
        };
        cursus_db.run_migrations().await?;
        tracing::debug!(path, "database opened");
        Ok(cursus_db)
    }

    /// Exclusive access to the connection until the guard is dropped.
    ///
    /// Never call back into a method that locks again while holding it.
    pub async fn conn(&self) -> MutexGuard<'_, libsql::Connection> {
        self.conn.lock().await
    }
}

/// Per-connection pragmas. SQLite keeps both settings on the connection, not
/// in the database file.
async fn configure_connection(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    conn.execute("PRAGMA foreign_keys = ON", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

    // busy_timeout answers with a row, which `execute` rejects, so it is
    // stepped through `query`. Writers on other connections then wait
    // instead of failing with SQLITE_BUSY.
    let mut rows = conn
        .query("PRAGMA busy_timeout = 5000", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;
    rows.next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;
    Ok(())
}

/// Generate a prefixed ID via libSQL. Returns e.g., `"enr-a3f8b2c1"`.
///
/// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
/// Runs on `conn`, which may be an open transaction.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails or returns no rows.
pub async fn generate_id(conn: &libsql::Connection, prefix: &str) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT '{prefix}-' || lower(hex(randomblob(4)))"),
            (),
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}

/// Begin a transaction that takes the write lock up front.
///
/// Checks evaluated inside it see the same snapshot the following writes
/// land on.
///
/// # Errors
///
/// Returns `DatabaseError` if the lock cannot be acquired.
pub async fn begin_immediate(
    conn: &libsql::Connection,
) -> Result<libsql::Transaction, DatabaseError> {
    Ok(conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .await?)
}

/// Commit `tx` if `result` is `Ok`, otherwise roll it back and return the
/// original error.
pub(crate) async fn finish_tx<T>(
    tx: libsql::Transaction,
    result: Result<T, DatabaseError>,
    op: &'static str,
) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(op, %rollback, "rollback failed");
            }
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursus_core::ids::ALL_PREFIXES;
    use std::collections::HashSet;

    async fn test_db() -> CursusDb {
        CursusDb::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;

        let tables = [
            "organizations",
            "learners",
            "courses",
            "modules",
            "groups",
            "enrollments",
            "module_progress",
            "audit_trail",
        ];
        for table in &tables {
            let mut rows = db
                .conn()
                .await
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_enabled() {
        let db = test_db().await;
        let mut rows = db.conn().await.query("PRAGMA foreign_keys", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn connection_guard_is_exclusive() {
        let db = test_db().await;
        let guard = db.conn().await;
        assert!(db.conn.try_lock().is_err());
        drop(guard);
        assert!(db.conn.try_lock().is_ok());
    }

    #[tokio::test]
    async fn generate_id_correct_format() {
        let db = test_db().await;
        let conn = db.conn().await;
        for prefix in ALL_PREFIXES {
            let id = generate_id(&conn, prefix).await.unwrap();
            assert!(id.starts_with(&format!("{prefix}-")), "bad prefix: {id}");
            assert_eq!(id.len(), 12, "ID should be 12 chars: {id}");
            assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[tokio::test]
    async fn generate_id_unique() {
        let db = test_db().await;
        let conn = db.conn().await;
        let mut ids = HashSet::new();
        for _ in 0..200 {
            assert!(ids.insert(generate_id(&conn, "enr").await.unwrap()));
        }
    }

    #[tokio::test]
    async fn rolled_back_transaction_leaves_no_rows() {
        let db = test_db().await;
        let conn = db.conn().await;
        let tx = begin_immediate(&conn).await.unwrap();
        tx.execute(
            "INSERT INTO organizations (id, name, slug) VALUES ('org-00000001', 'Acme', 'acme')",
            (),
        )
        .await
        .unwrap();
        let result: Result<(), DatabaseError> =
            finish_tx(tx, Err(DatabaseError::NoResult), "test").await;
        assert!(result.is_err());

        let mut rows = conn
            .query("SELECT COUNT(*) FROM organizations", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }
}
