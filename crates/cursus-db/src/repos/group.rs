//! Group repository: cohorts with an optional seat capacity, optionally bound
//! to one course.

use cursus_core::entities::{Group, GroupOccupancy};
use cursus_core::enums::{AuditAction, EntityType};
use cursus_core::ids::PREFIX_GROUP;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, query_scalar_i64, require_text};
use crate::repos::course::ensure_course;
use crate::repos::tenant::ensure_org;
use crate::service::CursusService;
use crate::{begin_immediate, finish_tx, generate_id};
use crate::updates::group::GroupUpdate;

const SELECT_COLS: &str =
    "id, organization_id, course_id, name, description, capacity, created_at, updated_at";

/// Input for [`CursusService::create_group`].
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    /// Zero or negative means unlimited.
    pub capacity: Option<i64>,
    pub course_id: Option<String>,
}

/// Filter criteria for group listings.
#[derive(Debug, Default)]
pub struct GroupFilter {
    pub course_id: Option<String>,
}

fn row_to_group(row: &libsql::Row) -> Result<Group, DatabaseError> {
    Ok(Group {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        course_id: get_opt_string(row, 2)?,
        name: row.get(3)?,
        description: get_opt_string(row, 4)?,
        capacity: row.get::<Option<i64>>(5)?,
        created_at: parse_datetime(&row.get::<String>(6)?)?,
        updated_at: parse_datetime(&row.get::<String>(7)?)?,
    })
}

pub(crate) async fn find_group(
    conn: &libsql::Connection,
    organization_id: &str,
    group_id: &str,
) -> Result<Option<Group>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM groups WHERE id = ?1 AND organization_id = ?2"),
            [group_id, organization_id],
        )
        .await?;
    rows.next().await?.map(|row| row_to_group(&row)).transpose()
}

pub(crate) async fn load_group(
    conn: &libsql::Connection,
    organization_id: &str,
    group_id: &str,
) -> Result<Group, DatabaseError> {
    find_group(conn, organization_id, group_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::Group, group_id))
}

/// Fail with `InvalidInput` unless the group exists inside the organization
/// and, when it is bound to a course, that course is `course_id`.
pub(crate) async fn ensure_group(
    conn: &libsql::Connection,
    organization_id: &str,
    group_id: &str,
    course_id: &str,
) -> Result<Group, DatabaseError> {
    let group = find_group(conn, organization_id, group_id)
        .await?
        .ok_or_else(|| {
            DatabaseError::InvalidInput(format!(
                "group {group_id} does not belong to organization {organization_id}"
            ))
        })?;
    if let Some(bound) = group.course_id.as_deref().filter(|bound| *bound != course_id) {
        return Err(DatabaseError::InvalidInput(format!(
            "group {group_id} is bound to course {bound}, not {course_id}"
        )));
    }
    Ok(group)
}

pub(crate) async fn occupancy_of(
    conn: &libsql::Connection,
    group: &Group,
) -> Result<GroupOccupancy, DatabaseError> {
    let occupied = query_scalar_i64(
        conn,
        "SELECT COUNT(*) FROM enrollments
         WHERE group_id = ?1 AND status NOT IN ('waitlisted', 'cancelled')",
        [group.id.as_str()],
    )
    .await?;
    let waitlisted = query_scalar_i64(
        conn,
        "SELECT COUNT(*) FROM enrollments WHERE group_id = ?1 AND status = 'waitlisted'",
        [group.id.as_str()],
    )
    .await?;
    Ok(GroupOccupancy {
        group_id: group.id.clone(),
        capacity: group.capacity,
        occupied,
        waitlisted,
    })
}

impl CursusService {
    pub async fn create_group(
        &self,
        organization_id: &str,
        input: &NewGroup,
    ) -> Result<Group, DatabaseError> {
        let name = require_text("group name", &input.name)?;
        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let capacity = input.capacity.filter(|c| *c > 0);

        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .create_group_in(&tx, organization_id, input, name, description, capacity)
            .await;
        finish_tx(tx, result, "create_group").await
    }

    async fn create_group_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        input: &NewGroup,
        name: &str,
        description: Option<&str>,
        capacity: Option<i64>,
    ) -> Result<Group, DatabaseError> {
        ensure_org(conn, organization_id).await?;
        if let Some(ref course_id) = input.course_id {
            ensure_course(conn, organization_id, course_id).await?;
        }

        let now = self.now();
        let id = generate_id(conn, PREFIX_GROUP).await?;
        conn.execute(
            &format!("INSERT INTO groups ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"),
            libsql::params![
                id.as_str(),
                organization_id,
                input.course_id.as_deref(),
                name,
                description,
                capacity,
                now.to_rfc3339()
            ],
        )
        .await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Group,
            &id,
            AuditAction::Created,
            None,
        )
        .await?;

        Ok(Group {
            id,
            organization_id: organization_id.to_string(),
            course_id: input.course_id.clone(),
            name: name.to_string(),
            description: description.map(String::from),
            capacity,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_group(
        &self,
        organization_id: &str,
        group_id: &str,
    ) -> Result<Group, DatabaseError> {
        load_group(&*self.db().conn().await, organization_id, group_id).await
    }

    pub async fn list_groups(
        &self,
        organization_id: &str,
        filter: &GroupFilter,
    ) -> Result<Vec<Group>, DatabaseError> {
        let mut sql = format!("SELECT {SELECT_COLS} FROM groups WHERE organization_id = ?1");
        let mut params: Vec<libsql::Value> = vec![organization_id.into()];
        if let Some(ref course_id) = filter.course_id {
            params.push(course_id.clone().into());
            sql.push_str(&format!(" AND course_id = ?{}", params.len()));
        }
        sql.push_str(" ORDER BY created_at, rowid");

        let conn = self.db().conn().await;
        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next().await? {
            groups.push(row_to_group(&row)?);
        }
        Ok(groups)
    }

    /// Lowering the capacity below the current occupancy is allowed; it only
    /// affects later admissions.
    pub async fn update_group(
        &self,
        organization_id: &str,
        group_id: &str,
        update: GroupUpdate,
    ) -> Result<Group, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .update_group_in(&tx, organization_id, group_id, &update)
            .await;
        finish_tx(tx, result, "update_group").await
    }

    async fn update_group_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        group_id: &str,
        update: &GroupUpdate,
    ) -> Result<Group, DatabaseError> {
        let current = load_group(conn, organization_id, group_id).await?;

        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1usize;

        if let Some(ref name) = update.name {
            sets.push(format!("name = ?{idx}"));
            params.push(require_text("group name", name)?.into());
            idx += 1;
        }
        if let Some(ref description) = update.description {
            sets.push(format!("description = ?{idx}"));
            params.push(description.clone().map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }
        if let Some(capacity) = update.capacity {
            if let Some(c) = capacity.filter(|c| *c <= 0) {
                return Err(DatabaseError::InvalidInput(format!(
                    "capacity must be positive, got {c}"
                )));
            }
            sets.push(format!("capacity = ?{idx}"));
            params.push(capacity.map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }

        if sets.is_empty() {
            return Ok(current);
        }

        sets.push(format!("updated_at = ?{idx}"));
        params.push(self.now().to_rfc3339().into());
        idx += 1;

        params.push(group_id.into());
        let sql = format!("UPDATE groups SET {} WHERE id = ?{idx}", sets.join(", "));
        conn.execute(&sql, libsql::params_from_iter(params)).await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Group,
            group_id,
            AuditAction::Updated,
            Some(serde_json::to_value(update)?),
        )
        .await?;

        load_group(conn, organization_id, group_id).await
    }

    /// Delete a group. Its enrollments stay and lose their group reference.
    pub async fn delete_group(
        &self,
        organization_id: &str,
        group_id: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self.delete_group_in(&tx, organization_id, group_id).await;
        let detached = finish_tx(tx, result, "delete_group").await?;
        tracing::info!(group_id, detached, "group deleted");
        Ok(())
    }

    async fn delete_group_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        group_id: &str,
    ) -> Result<u64, DatabaseError> {
        load_group(conn, organization_id, group_id).await?;
        let detached = conn
            .execute(
                "UPDATE enrollments SET group_id = NULL, updated_at = ?1 WHERE group_id = ?2",
                libsql::params![self.now().to_rfc3339(), group_id],
            )
            .await?;
        conn.execute("DELETE FROM groups WHERE id = ?1", [group_id])
            .await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Group,
            group_id,
            AuditAction::Deleted,
            None,
        )
        .await?;
        Ok(detached)
    }

    /// Seats taken (`occupied`) and queued (`waitlisted`) in a group.
    pub async fn group_occupancy(
        &self,
        organization_id: &str,
        group_id: &str,
    ) -> Result<GroupOccupancy, DatabaseError> {
        let conn = self.db().conn().await;
        let group = load_group(&conn, organization_id, group_id).await?;
        occupancy_of(&conn, &group).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{seed_course, seed_org, test_service};
    use crate::updates::group::GroupUpdateBuilder;
    use rstest::rstest;

    fn new_group(name: &str, capacity: Option<i64>, course_id: Option<&str>) -> NewGroup {
        NewGroup {
            name: name.into(),
            description: None,
            capacity,
            course_id: course_id.map(String::from),
        }
    }

    #[rstest]
    #[case(Some(5), Some(5))]
    #[case(Some(0), None)]
    #[case(Some(-3), None)]
    #[case(None, None)]
    #[tokio::test]
    async fn non_positive_capacity_means_unlimited(
        #[case] requested: Option<i64>,
        #[case] stored: Option<i64>,
    ) {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let group = svc
            .create_group(&org.id, &new_group("Cohort", requested, None))
            .await
            .unwrap();
        assert_eq!(group.capacity, stored);
        assert_eq!(svc.get_group(&org.id, &group.id).await.unwrap(), group);
    }

    #[tokio::test]
    async fn create_group_checks_course_tenant() {
        let svc = test_service().await;
        let acme = seed_org(&svc, "acme").await;
        let globex = seed_org(&svc, "globex").await;
        let (course, _) = seed_course(&svc, &acme.id, "Private", 0).await;

        let err = svc
            .create_group(&globex.id, &new_group("Cohort", None, Some(&course.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn list_groups_by_course() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, _) = seed_course(&svc, &org.id, "Bound", 0).await;

        svc.create_group(&org.id, &new_group("Bound", Some(2), Some(&course.id)))
            .await
            .unwrap();
        svc.create_group(&org.id, &new_group("Floating", None, None))
            .await
            .unwrap();

        let all = svc.list_groups(&org.id, &GroupFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        let bound = svc
            .list_groups(
                &org.id,
                &GroupFilter {
                    course_id: Some(course.id.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "Bound");
    }

    #[tokio::test]
    async fn update_group_capacity() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let group = svc
            .create_group(&org.id, &new_group("Cohort", Some(2), None))
            .await
            .unwrap();

        let err = svc
            .update_group(&org.id, &group.id, GroupUpdateBuilder::new().capacity(Some(0)).build())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));

        let updated = svc
            .update_group(
                &org.id,
                &group.id,
                GroupUpdateBuilder::new().name("Renamed").capacity(None).build(),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.capacity, None);
    }

    #[tokio::test]
    async fn empty_group_occupancy() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let group = svc
            .create_group(&org.id, &new_group("Cohort", Some(3), None))
            .await
            .unwrap();
        let occupancy = svc.group_occupancy(&org.id, &group.id).await.unwrap();
        assert_eq!(occupancy.occupied, 0);
        assert_eq!(occupancy.waitlisted, 0);
        assert_eq!(occupancy.free_seats(), Some(3));
    }

    #[tokio::test]
    async fn delete_group_is_tenant_scoped() {
        let svc = test_service().await;
        let acme = seed_org(&svc, "acme").await;
        let globex = seed_org(&svc, "globex").await;
        let group = svc
            .create_group(&acme.id, &new_group("Cohort", None, None))
            .await
            .unwrap();

        let err = svc.delete_group(&globex.id, &group.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));

        svc.delete_group(&acme.id, &group.id).await.unwrap();
        let err = svc.get_group(&acme.id, &group.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
