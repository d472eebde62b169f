//! Course repository: CRUD, publication status and the cascading hard delete.

use cursus_core::audit_detail::{CourseDeletedDetail, StatusChangedDetail};
use cursus_core::entities::Course;
use cursus_core::enums::{AuditAction, CourseStatus, EntityType};
use cursus_core::ids::PREFIX_COURSE;

use crate::error::DatabaseError;
use crate::helpers::{
    get_opt_string, is_unique_violation, parse_datetime, parse_enum, parse_optional_datetime,
    require_text, sanitize_slug,
};
use crate::repos::tenant::ensure_org;
use crate::service::CursusService;
use crate::{begin_immediate, finish_tx, generate_id};
use crate::updates::course::CourseUpdate;

const SELECT_COLS: &str = "id, organization_id, title, slug, description, status, version, \
     published_at, created_at, updated_at";

/// Input for [`CursusService::create_course`].
#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// Filter criteria for course listings.
#[derive(Debug, Default)]
pub struct CourseFilter {
    pub status: Option<CourseStatus>,
}

fn row_to_course(row: &libsql::Row) -> Result<Course, DatabaseError> {
    Ok(Course {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        description: get_opt_string(row, 4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        version: row.get(6)?,
        published_at: parse_optional_datetime(get_opt_string(row, 7)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(8)?)?,
        updated_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

pub(crate) async fn find_course(
    conn: &libsql::Connection,
    organization_id: &str,
    course_id: &str,
) -> Result<Option<Course>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM courses WHERE id = ?1 AND organization_id = ?2"),
            [course_id, organization_id],
        )
        .await?;
    rows.next().await?.map(|row| row_to_course(&row)).transpose()
}

/// Fail with `InvalidInput` unless the course exists inside the organization.
pub(crate) async fn ensure_course(
    conn: &libsql::Connection,
    organization_id: &str,
    course_id: &str,
) -> Result<Course, DatabaseError> {
    find_course(conn, organization_id, course_id)
        .await?
        .ok_or_else(|| {
            DatabaseError::InvalidInput(format!(
                "course {course_id} does not belong to organization {organization_id}"
            ))
        })
}

pub(crate) async fn load_course(
    conn: &libsql::Connection,
    organization_id: &str,
    course_id: &str,
) -> Result<Course, DatabaseError> {
    find_course(conn, organization_id, course_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::Course, course_id))
}

impl CursusService {
    pub async fn create_course(
        &self,
        organization_id: &str,
        input: &NewCourse,
    ) -> Result<Course, DatabaseError> {
        let title = require_text("course title", &input.title)?;
        let slug = sanitize_slug(input.slug.as_deref().unwrap_or(title));
        if slug.is_empty() {
            return Err(DatabaseError::InvalidInput(
                "course slug must contain letters or digits".into(),
            ));
        }
        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .create_course_in(&tx, organization_id, title, slug, description)
            .await;
        finish_tx(tx, result, "create_course").await
    }

    async fn create_course_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        title: &str,
        slug: String,
        description: Option<&str>,
    ) -> Result<Course, DatabaseError> {
        ensure_org(conn, organization_id).await?;

        let now = self.now();
        let id = generate_id(conn, PREFIX_COURSE).await?;

        conn.execute(
            &format!(
                "INSERT INTO courses ({SELECT_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, NULL, ?7, ?7)"
            ),
            libsql::params![
                id.as_str(),
                organization_id,
                title,
                slug.as_str(),
                description,
                CourseStatus::Draft.as_str(),
                now.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DatabaseError::Conflict(format!("course slug '{slug}' is taken"))
            } else {
                e.into()
            }
        })?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Course,
            &id,
            AuditAction::Created,
            None,
        )
        .await?;

        Ok(Course {
            id,
            organization_id: organization_id.to_string(),
            title: title.to_string(),
            slug,
            description: description.map(String::from),
            status: CourseStatus::Draft,
            version: 1,
            published_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_course(
        &self,
        organization_id: &str,
        course_id: &str,
    ) -> Result<Course, DatabaseError> {
        load_course(&*self.db().conn().await, organization_id, course_id).await
    }

    pub async fn list_courses(
        &self,
        organization_id: &str,
        filter: &CourseFilter,
    ) -> Result<Vec<Course>, DatabaseError> {
        let mut sql = format!("SELECT {SELECT_COLS} FROM courses WHERE organization_id = ?1");
        let mut params: Vec<libsql::Value> = vec![organization_id.into()];
        if let Some(status) = filter.status {
            params.push(status.as_str().into());
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }
        sql.push_str(" ORDER BY created_at, rowid");

        let conn = self.db().conn().await;
        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut courses = Vec::new();
        while let Some(row) = rows.next().await? {
            courses.push(row_to_course(&row)?);
        }
        Ok(courses)
    }

    pub async fn update_course(
        &self,
        organization_id: &str,
        course_id: &str,
        update: CourseUpdate,
    ) -> Result<Course, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .update_course_in(&tx, organization_id, course_id, &update)
            .await;
        finish_tx(tx, result, "update_course").await
    }

    async fn update_course_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        course_id: &str,
        update: &CourseUpdate,
    ) -> Result<Course, DatabaseError> {
        let current = load_course(conn, organization_id, course_id).await?;

        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1usize;

        if let Some(ref title) = update.title {
            sets.push(format!("title = ?{idx}"));
            params.push(require_text("course title", title)?.into());
            idx += 1;
        }
        if let Some(ref description) = update.description {
            sets.push(format!("description = ?{idx}"));
            params.push(description.clone().map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }

        if sets.is_empty() {
            return Ok(current);
        }

        sets.push(format!("updated_at = ?{idx}"));
        params.push(self.now().to_rfc3339().into());
        idx += 1;

        params.push(course_id.into());
        let sql = format!("UPDATE courses SET {} WHERE id = ?{idx}", sets.join(", "));
        conn.execute(&sql, libsql::params_from_iter(params)).await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Course,
            course_id,
            AuditAction::Updated,
            Some(serde_json::to_value(update)?),
        )
        .await?;

        load_course(conn, organization_id, course_id).await
    }

    /// Publish a course: stamps `published_at` and bumps `version`.
    pub async fn publish_course(
        &self,
        organization_id: &str,
        course_id: &str,
    ) -> Result<Course, DatabaseError> {
        self.set_course_status(organization_id, course_id, CourseStatus::Published)
            .await
    }

    pub async fn unpublish_course(
        &self,
        organization_id: &str,
        course_id: &str,
    ) -> Result<Course, DatabaseError> {
        self.set_course_status(organization_id, course_id, CourseStatus::Draft)
            .await
    }

    /// Soft removal; the course and everything under it stays in place.
    pub async fn archive_course(
        &self,
        organization_id: &str,
        course_id: &str,
    ) -> Result<Course, DatabaseError> {
        self.set_course_status(organization_id, course_id, CourseStatus::Archived)
            .await
    }

    async fn set_course_status(
        &self,
        organization_id: &str,
        course_id: &str,
        status: CourseStatus,
    ) -> Result<Course, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .set_course_status_in(&tx, organization_id, course_id, status)
            .await;
        finish_tx(tx, result, "set_course_status").await
    }

    async fn set_course_status_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        course_id: &str,
        status: CourseStatus,
    ) -> Result<Course, DatabaseError> {
        let current = load_course(conn, organization_id, course_id).await?;
        let now = self.now();

        if status == CourseStatus::Published {
            conn.execute(
                "UPDATE courses SET status = ?1, published_at = ?2, version = version + 1,
                 updated_at = ?2 WHERE id = ?3",
                libsql::params![status.as_str(), now.to_rfc3339(), course_id],
            )
            .await?;
        } else {
            conn.execute(
                "UPDATE courses SET status = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![status.as_str(), now.to_rfc3339(), course_id],
            )
            .await?;
        }

        let detail = StatusChangedDetail {
            from: current.status.as_str().to_string(),
            to: status.as_str().to_string(),
            reason: None,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Course,
            course_id,
            AuditAction::StatusChanged,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;

        load_course(conn, organization_id, course_id).await
    }

    /// Hard-delete a course. Removes its modules, their progress, and every
    /// enrollment in the course; groups bound to it are detached, not deleted.
    pub async fn delete_course(
        &self,
        organization_id: &str,
        course_id: &str,
    ) -> Result<CourseDeletedDetail, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .delete_course_in(&tx, organization_id, course_id)
            .await;
        let detail = finish_tx(tx, result, "delete_course").await?;
        tracing::info!(
            course_id,
            modules = detail.modules,
            enrollments = detail.enrollments,
            groups_detached = detail.groups_detached,
            "course deleted"
        );
        Ok(detail)
    }

    async fn delete_course_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        course_id: &str,
    ) -> Result<CourseDeletedDetail, DatabaseError> {
        load_course(conn, organization_id, course_id).await?;

        let progress_records = conn
            .execute(
                "DELETE FROM module_progress
                 WHERE module_id IN (SELECT id FROM modules WHERE course_id = ?1)
                    OR enrollment_id IN (SELECT id FROM enrollments WHERE course_id = ?1)",
                [course_id],
            )
            .await?;
        let enrollments = conn
            .execute(
                "DELETE FROM enrollments WHERE course_id = ?1 AND organization_id = ?2",
                [course_id, organization_id],
            )
            .await?;
        let groups_detached = conn
            .execute(
                "UPDATE groups SET course_id = NULL, updated_at = ?1
                 WHERE course_id = ?2 AND organization_id = ?3",
                libsql::params![self.now().to_rfc3339(), course_id, organization_id],
            )
            .await?;
        let modules = conn
            .execute("DELETE FROM modules WHERE course_id = ?1", [course_id])
            .await?;
        conn.execute(
            "DELETE FROM courses WHERE id = ?1 AND organization_id = ?2",
            [course_id, organization_id],
        )
        .await?;

        let detail = CourseDeletedDetail {
            modules,
            enrollments,
            progress_records,
            groups_detached,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Course,
            course_id,
            AuditAction::Deleted,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;
        Ok(detail)
    }
}
