//! Audit trail repository.
//!
//! Append-only audit entries recording every mutation, scoped by
//! organization and filterable by entity and action.

use cursus_core::entities::AuditEntry;
use cursus_core::enums::{AuditAction, EntityType};
use cursus_core::ids::PREFIX_AUDIT;

use crate::error::DatabaseError;
use crate::generate_id;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_optional_json};
use crate::service::CursusService;

const SELECT_COLS: &str =
    "id, organization_id, entity_type, entity_id, action, detail, created_at";

/// Filter criteria for audit queries.
#[derive(Debug, Default)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub limit: Option<u32>,
}

fn row_to_audit(row: &libsql::Row) -> Result<AuditEntry, DatabaseError> {
    Ok(AuditEntry {
        id: row.get::<String>(0)?,
        organization_id: row.get::<String>(1)?,
        entity_type: parse_enum(&row.get::<String>(2)?)?,
        entity_id: row.get::<String>(3)?,
        action: parse_enum(&row.get::<String>(4)?)?,
        detail: parse_optional_json(get_opt_string(row, 5)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

impl CursusService {
    /// Append an audit entry on the service connection.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the INSERT fails.
    pub async fn append_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        append_audit_on(&*self.db().conn().await, entry).await
    }

    /// Build and append an audit entry on `conn`, which may be an open
    /// transaction.
    pub(crate) async fn record_audit(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        action: AuditAction,
        detail: Option<serde_json::Value>,
    ) -> Result<(), DatabaseError> {
        let entry = AuditEntry {
            id: generate_id(conn, PREFIX_AUDIT).await?,
            organization_id: organization_id.to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            detail,
            created_at: self.now(),
        };
        append_audit_on(conn, &entry).await
    }

    /// Query audit entries of one organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query_audit(
        &self,
        organization_id: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, DatabaseError> {
        let mut conditions = vec!["organization_id = ?1".to_string()];
        let mut params: Vec<libsql::Value> = vec![organization_id.into()];

        if let Some(ref et) = filter.entity_type {
            params.push(et.as_str().into());
            conditions.push(format!("entity_type = ?{}", params.len()));
        }
        if let Some(ref eid) = filter.entity_id {
            params.push(eid.clone().into());
            conditions.push(format!("entity_id = ?{}", params.len()));
        }
        if let Some(ref action) = filter.action {
            params.push(action.as_str().into());
            conditions.push(format!("action = ?{}", params.len()));
        }

        let limit = filter.limit.unwrap_or_else(|| self.default_limit());
        let sql = format!(
            "SELECT {SELECT_COLS} FROM audit_trail WHERE {}
             ORDER BY created_at DESC, rowid DESC LIMIT {limit}",
            conditions.join(" AND ")
        );

        let conn = self.db().conn().await;
        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_audit(&row)?);
        }
        Ok(entries)
    }
}

async fn append_audit_on(conn: &libsql::Connection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO audit_trail ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        libsql::params![
            entry.id.as_str(),
            entry.organization_id.as_str(),
            entry.entity_type.as_str(),
            entry.entity_id.as_str(),
            entry.action.as_str(),
            entry.detail.as_ref().map(std::string::ToString::to_string),
            entry.created_at.to_rfc3339()
        ],
    )
    .await?;
    Ok(())
}
