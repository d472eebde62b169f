//! Tenant directory: organizations, learners and the existence checks every
//! other repository runs before touching organization-scoped rows.

use cursus_core::entities::{Learner, Organization};
use cursus_core::enums::{AuditAction, EntityType};
use cursus_core::ids::{PREFIX_LEARNER, PREFIX_ORGANIZATION};

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, is_unique_violation, parse_datetime, require_text, sanitize_slug};
use crate::service::CursusService;
use crate::{begin_immediate, finish_tx, generate_id};

const ORG_COLS: &str = "id, name, slug, created_at";
const LEARNER_COLS: &str = "id, organization_id, email, display_name, created_at";

fn row_to_organization(row: &libsql::Row) -> Result<Organization, DatabaseError> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at: parse_datetime(&row.get::<String>(3)?)?,
    })
}

fn row_to_learner(row: &libsql::Row) -> Result<Learner, DatabaseError> {
    Ok(Learner {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        email: row.get(2)?,
        display_name: get_opt_string(row, 3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

/// Fail with `InvalidInput` unless the organization exists.
pub(crate) async fn ensure_org(
    conn: &libsql::Connection,
    organization_id: &str,
) -> Result<(), DatabaseError> {
    let mut rows = conn
        .query("SELECT 1 FROM organizations WHERE id = ?1", [organization_id])
        .await?;
    if rows.next().await?.is_none() {
        return Err(DatabaseError::InvalidInput(format!(
            "organization {organization_id} does not exist"
        )));
    }
    Ok(())
}

/// Fail with `InvalidInput` unless the learner exists inside the organization.
pub(crate) async fn ensure_learner(
    conn: &libsql::Connection,
    organization_id: &str,
    learner_id: &str,
) -> Result<(), DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM learners WHERE id = ?1 AND organization_id = ?2",
            [learner_id, organization_id],
        )
        .await?;
    if rows.next().await?.is_none() {
        return Err(DatabaseError::InvalidInput(format!(
            "learner {learner_id} does not belong to organization {organization_id}"
        )));
    }
    Ok(())
}

impl CursusService {
    pub async fn create_organization(
        &self,
        name: &str,
        slug: Option<&str>,
    ) -> Result<Organization, DatabaseError> {
        let name = require_text("organization name", name)?;
        let slug = sanitize_slug(slug.unwrap_or(name));
        if slug.is_empty() {
            return Err(DatabaseError::InvalidInput(
                "organization slug must contain letters or digits".into(),
            ));
        }

        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self.create_organization_in(&tx, name, slug).await;
        finish_tx(tx, result, "create_organization").await
    }

    async fn create_organization_in(
        &self,
        conn: &libsql::Connection,
        name: &str,
        slug: String,
    ) -> Result<Organization, DatabaseError> {
        let now = self.now();
        let id = generate_id(conn, PREFIX_ORGANIZATION).await?;

        conn.execute(
            &format!("INSERT INTO organizations ({ORG_COLS}) VALUES (?1, ?2, ?3, ?4)"),
            libsql::params![id.as_str(), name, slug.as_str(), now.to_rfc3339()],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DatabaseError::Conflict(format!("organization slug '{slug}' is taken"))
            } else {
                e.into()
            }
        })?;

        self.record_audit(
            conn,
            &id,
            EntityType::Organization,
            &id,
            AuditAction::Created,
            None,
        )
        .await?;

        Ok(Organization {
            id,
            name: name.to_string(),
            slug,
            created_at: now,
        })
    }

    pub async fn get_organization(&self, id: &str) -> Result<Organization, DatabaseError> {
        let conn = self.db().conn().await;
        let mut rows = conn
            .query(&format!("SELECT {ORG_COLS} FROM organizations WHERE id = ?1"), [id])
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Organization, id))?;
        row_to_organization(&row)
    }

    /// Register a learner in an organization. Emails are unique per
    /// organization and stored lower-cased.
    pub async fn register_learner(
        &self,
        organization_id: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<Learner, DatabaseError> {
        let email = require_text("email", email)?.to_lowercase();
        if !email.contains('@') {
            return Err(DatabaseError::InvalidInput(format!(
                "'{email}' is not an email address"
            )));
        }
        let display_name = display_name.map(str::trim).filter(|s| !s.is_empty());

        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .register_learner_in(&tx, organization_id, email, display_name)
            .await;
        finish_tx(tx, result, "register_learner").await
    }

    async fn register_learner_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        email: String,
        display_name: Option<&str>,
    ) -> Result<Learner, DatabaseError> {
        ensure_org(conn, organization_id).await?;

        let now = self.now();
        let id = generate_id(conn, PREFIX_LEARNER).await?;

        conn.execute(
            &format!("INSERT INTO learners ({LEARNER_COLS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            libsql::params![
                id.as_str(),
                organization_id,
                email.as_str(),
                display_name,
                now.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DatabaseError::Conflict(format!("learner '{email}' is already registered"))
            } else {
                e.into()
            }
        })?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Learner,
            &id,
            AuditAction::Created,
            None,
        )
        .await?;

        Ok(Learner {
            id,
            organization_id: organization_id.to_string(),
            email,
            display_name: display_name.map(String::from),
            created_at: now,
        })
    }

    /// Identity resolution: the learner, provided it exists inside the
    /// organization.
    pub async fn resolve_learner(
        &self,
        organization_id: &str,
        learner_id: &str,
    ) -> Result<Learner, DatabaseError> {
        let conn = self.db().conn().await;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LEARNER_COLS} FROM learners WHERE id = ?1 AND organization_id = ?2"
                ),
                [learner_id, organization_id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Learner, learner_id))?;
        row_to_learner(&row)
    }

    pub async fn list_learners(&self, organization_id: &str) -> Result<Vec<Learner>, DatabaseError> {
        let conn = self.db().conn().await;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LEARNER_COLS} FROM learners WHERE organization_id = ?1
                     ORDER BY email"
                ),
                [organization_id],
            )
            .await?;

        let mut learners = Vec::new();
        while let Some(row) = rows.next().await? {
            learners.push(row_to_learner(&row)?);
        }
        Ok(learners)
    }
}
