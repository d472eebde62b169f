//! Enrollment registry and group admission.
//!
//! Admission is decided inside the same SQL statement that writes the row:
//! the seat count of the group and the insert (or re-admission update) are
//! evaluated together, so concurrent enrolls can never push a group past its
//! capacity. Waitlisted enrollments are only promoted by an explicit
//! [`CursusService::promote_waitlisted`] call.

use cursus_core::audit_detail::{AdmissionDetail, StatusChangedDetail};
use cursus_core::entities::Enrollment;
use cursus_core::enums::{AuditAction, EnrollmentStatus, EntityType};
use cursus_core::ids::PREFIX_ENROLLMENT;

use crate::error::DatabaseError;
use crate::helpers::{
    get_opt_string, is_unique_violation, opt_datetime_value, parse_datetime, parse_enum,
    parse_optional_datetime, parse_optional_json,
};
use crate::repos::course::ensure_course;
use crate::repos::group::{ensure_group, find_group, occupancy_of};
use crate::repos::tenant::{ensure_learner, ensure_org};
use crate::service::CursusService;
use crate::updates::enrollment::EnrollmentUpdate;
use crate::{begin_immediate, finish_tx, generate_id};

const SELECT_COLS: &str = "id, organization_id, course_id, learner_id, group_id, status, progress, \
     started_at, completed_at, metadata, created_at, updated_at";

/// Input for [`CursusService::enroll`].
#[derive(Debug, Clone, Default)]
pub struct NewEnrollment {
    pub course_id: String,
    pub learner_id: String,
    pub group_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Filter criteria for enrollment listings.
#[derive(Debug, Default)]
pub struct EnrollmentFilter {
    pub course_id: Option<String>,
    pub learner_id: Option<String>,
    pub group_id: Option<String>,
    pub status: Option<EnrollmentStatus>,
    pub limit: Option<u32>,
}

pub(crate) fn row_to_enrollment(row: &libsql::Row) -> Result<Enrollment, DatabaseError> {
    Ok(Enrollment {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        course_id: row.get(2)?,
        learner_id: row.get(3)?,
        group_id: get_opt_string(row, 4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        progress: row.get(6)?,
        started_at: parse_optional_datetime(get_opt_string(row, 7)?.as_deref())?,
        completed_at: parse_optional_datetime(get_opt_string(row, 8)?.as_deref())?,
        metadata: parse_optional_json(get_opt_string(row, 9)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(10)?)?,
        updated_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

pub(crate) async fn find_enrollment(
    conn: &libsql::Connection,
    organization_id: &str,
    enrollment_id: &str,
) -> Result<Option<Enrollment>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM enrollments WHERE id = ?1 AND organization_id = ?2"
            ),
            [enrollment_id, organization_id],
        )
        .await?;
    rows.next().await?.map(|row| row_to_enrollment(&row)).transpose()
}

pub(crate) async fn load_enrollment(
    conn: &libsql::Connection,
    organization_id: &str,
    enrollment_id: &str,
) -> Result<Enrollment, DatabaseError> {
    find_enrollment(conn, organization_id, enrollment_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::Enrollment, enrollment_id))
}

/// SQL expression yielding `'waitlisted'` when the group referenced by
/// `group_expr` has a positive capacity that its seated enrollments already
/// fill, `'active'` otherwise (including when `group_expr` is NULL).
fn admission_status_sql(group_expr: &str) -> String {
    format!(
        "CASE WHEN EXISTS (
            SELECT 1 FROM groups g
            WHERE g.id = {group_expr}
              AND g.capacity > 0
              AND (SELECT COUNT(*) FROM enrollments seated
                   WHERE seated.group_id = g.id
                     AND seated.status NOT IN ('waitlisted', 'cancelled')) >= g.capacity
        ) THEN 'waitlisted' ELSE 'active' END"
    )
}

fn metadata_text(metadata: Option<&serde_json::Value>) -> Option<String> {
    metadata.map(std::string::ToString::to_string)
}

impl CursusService {
    /// Enroll a learner in a course, optionally into a group.
    ///
    /// The enrollment is created `active` (with `started_at` stamped) unless
    /// the group is at capacity, in which case it is `waitlisted`.
    pub async fn enroll(
        &self,
        organization_id: &str,
        input: &NewEnrollment,
    ) -> Result<Enrollment, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self.enroll_in(&tx, organization_id, input).await;
        let enrollment = finish_tx(tx, result, "enroll").await?;
        tracing::info!(
            enrollment_id = %enrollment.id,
            course_id = %enrollment.course_id,
            learner_id = %enrollment.learner_id,
            status = %enrollment.status,
            "learner admitted"
        );
        Ok(enrollment)
    }

    async fn enroll_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        input: &NewEnrollment,
    ) -> Result<Enrollment, DatabaseError> {
        ensure_org(conn, organization_id).await?;
        ensure_course(conn, organization_id, &input.course_id).await?;
        ensure_learner(conn, organization_id, &input.learner_id).await?;
        if let Some(ref group_id) = input.group_id {
            ensure_group(conn, organization_id, group_id, &input.course_id).await?;
        }

        let already_enrolled = || DatabaseError::AlreadyEnrolled {
            course_id: input.course_id.clone(),
            learner_id: input.learner_id.clone(),
        };

        let mut rows = conn
            .query(
                "SELECT id, status FROM enrollments
                 WHERE organization_id = ?1 AND course_id = ?2 AND learner_id = ?3",
                [
                    organization_id,
                    input.course_id.as_str(),
                    input.learner_id.as_str(),
                ],
            )
            .await?;
        let existing = match rows.next().await? {
            Some(row) => Some((
                row.get::<String>(0)?,
                parse_enum::<EnrollmentStatus>(&row.get::<String>(1)?)?,
            )),
            None => None,
        };

        let now = self.now();
        let id = match existing {
            Some((id, EnrollmentStatus::Cancelled)) if self.allows_reenroll_cancelled() => {
                let sql = format!(
                    "UPDATE enrollments SET
                        group_id = ?2,
                        status = {status},
                        started_at = CASE WHEN {status} = 'active' THEN ?3 END,
                        progress = 0,
                        completed_at = NULL,
                        metadata = COALESCE(?4, metadata),
                        updated_at = ?3
                     WHERE id = ?1 AND status = 'cancelled'",
                    status = admission_status_sql("?2")
                );
                conn.execute(
                    &sql,
                    libsql::params![
                        id.as_str(),
                        input.group_id.as_deref(),
                        now.to_rfc3339(),
                        metadata_text(input.metadata.as_ref())
                    ],
                )
                .await?;
                id
            }
            Some(_) => return Err(already_enrolled()),
            None => {
                let id = generate_id(conn, PREFIX_ENROLLMENT).await?;
                let sql = format!(
                    "INSERT INTO enrollments ({SELECT_COLS})
                     SELECT ?1, ?2, ?3, ?4, ?5, adm.status, 0,
                            CASE WHEN adm.status = 'active' THEN ?6 END,
                            NULL, ?7, ?6, ?6
                     FROM (SELECT {} AS status) AS adm",
                    admission_status_sql("?5")
                );
                conn.execute(
                    &sql,
                    libsql::params![
                        id.as_str(),
                        organization_id,
                        input.course_id.as_str(),
                        input.learner_id.as_str(),
                        input.group_id.as_deref(),
                        now.to_rfc3339(),
                        metadata_text(input.metadata.as_ref())
                    ],
                )
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        already_enrolled()
                    } else {
                        e.into()
                    }
                })?;
                id
            }
        };

        let enrollment = load_enrollment(conn, organization_id, &id).await?;
        let action = if enrollment.status == EnrollmentStatus::Waitlisted {
            AuditAction::Waitlisted
        } else {
            AuditAction::Admitted
        };
        let detail = AdmissionDetail {
            course_id: enrollment.course_id.clone(),
            learner_id: enrollment.learner_id.clone(),
            group_id: enrollment.group_id.clone(),
            status: enrollment.status.as_str().to_string(),
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Enrollment,
            &enrollment.id,
            action,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;

        Ok(enrollment)
    }

    pub async fn get_enrollment(
        &self,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        load_enrollment(&*self.db().conn().await, organization_id, enrollment_id).await
    }

    pub async fn list_enrollments(
        &self,
        organization_id: &str,
        filter: &EnrollmentFilter,
    ) -> Result<Vec<Enrollment>, DatabaseError> {
        let mut conditions = vec!["organization_id = ?1".to_string()];
        let mut params: Vec<libsql::Value> = vec![organization_id.into()];

        if let Some(ref course_id) = filter.course_id {
            params.push(course_id.clone().into());
            conditions.push(format!("course_id = ?{}", params.len()));
        }
        if let Some(ref learner_id) = filter.learner_id {
            params.push(learner_id.clone().into());
            conditions.push(format!("learner_id = ?{}", params.len()));
        }
        if let Some(ref group_id) = filter.group_id {
            params.push(group_id.clone().into());
            conditions.push(format!("group_id = ?{}", params.len()));
        }
        if let Some(status) = filter.status {
            params.push(status.as_str().into());
            conditions.push(format!("status = ?{}", params.len()));
        }

        let limit = filter.limit.unwrap_or_else(|| self.default_limit());
        let sql = format!(
            "SELECT {SELECT_COLS} FROM enrollments WHERE {}
             ORDER BY created_at, rowid LIMIT {limit}",
            conditions.join(" AND ")
        );

        let conn = self.db().conn().await;
        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let mut enrollments = Vec::new();
        while let Some(row) = rows.next().await? {
            enrollments.push(row_to_enrollment(&row)?);
        }
        Ok(enrollments)
    }

    /// Administrative override of enrollment fields.
    ///
    /// Status and progress are written as given and are not reconciled with
    /// module progress; only [`CursusService::recompute_enrollment_progress`]
    /// keeps them consistent.
    pub async fn update_enrollment(
        &self,
        organization_id: &str,
        enrollment_id: &str,
        update: EnrollmentUpdate,
    ) -> Result<Enrollment, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .update_enrollment_in(&tx, organization_id, enrollment_id, &update)
            .await;
        finish_tx(tx, result, "update_enrollment").await
    }

    async fn update_enrollment_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
        update: &EnrollmentUpdate,
    ) -> Result<Enrollment, DatabaseError> {
        let current = load_enrollment(conn, organization_id, enrollment_id).await?;
        let now = self.now();

        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1usize;

        let mut started_at = update.started_at;
        let mut completed_at = update.completed_at;

        if let Some(status) = update.status {
            sets.push(format!("status = ?{idx}"));
            params.push(status.as_str().into());
            idx += 1;
            if status == EnrollmentStatus::Active && started_at.is_none() {
                started_at = Some(now);
            }
        }
        if let Some(progress) = update.progress {
            if !progress.is_finite() {
                return Err(DatabaseError::InvalidInput(format!(
                    "progress must be a finite number, got {progress}"
                )));
            }
            let progress = progress.clamp(0.0, 100.0);
            sets.push(format!("progress = ?{idx}"));
            params.push(progress.into());
            idx += 1;
            if progress >= 100.0 && completed_at.is_none() {
                completed_at = Some(now);
            }
        }
        if let Some(ref metadata) = update.metadata {
            sets.push(format!("metadata = ?{idx}"));
            params.push(metadata_text(metadata.as_ref()).map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }
        if let Some(ref group_id) = update.group_id {
            if let Some(group_id) = group_id {
                ensure_group(conn, organization_id, group_id, &current.course_id).await?;
            }
            sets.push(format!("group_id = ?{idx}"));
            params.push(group_id.clone().map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }
        if started_at.is_some() {
            sets.push(format!("started_at = ?{idx}"));
            params.push(opt_datetime_value(started_at));
            idx += 1;
        }
        if completed_at.is_some() {
            sets.push(format!("completed_at = ?{idx}"));
            params.push(opt_datetime_value(completed_at));
            idx += 1;
        }

        if sets.is_empty() {
            return Ok(current);
        }

        sets.push(format!("updated_at = ?{idx}"));
        params.push(now.to_rfc3339().into());
        idx += 1;

        params.push(enrollment_id.into());
        let sql = format!("UPDATE enrollments SET {} WHERE id = ?{idx}", sets.join(", "));
        conn.execute(&sql, libsql::params_from_iter(params)).await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Enrollment,
            enrollment_id,
            AuditAction::Updated,
            Some(serde_json::to_value(update)?),
        )
        .await?;

        load_enrollment(conn, organization_id, enrollment_id).await
    }

    /// Cancel an enrollment. Module progress is kept, the seat is released
    /// and nobody on the waitlist is promoted.
    pub async fn cancel_enrollment(
        &self,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .cancel_enrollment_in(&tx, organization_id, enrollment_id)
            .await;
        finish_tx(tx, result, "cancel_enrollment").await
    }

    async fn cancel_enrollment_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let current = load_enrollment(conn, organization_id, enrollment_id).await?;
        if current.status == EnrollmentStatus::Cancelled {
            return Ok(current);
        }

        conn.execute(
            "UPDATE enrollments SET status = ?1, updated_at = ?2 WHERE id = ?3",
            libsql::params![
                EnrollmentStatus::Cancelled.as_str(),
                self.now().to_rfc3339(),
                enrollment_id
            ],
        )
        .await?;

        let detail = StatusChangedDetail {
            from: current.status.as_str().to_string(),
            to: EnrollmentStatus::Cancelled.as_str().to_string(),
            reason: None,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Enrollment,
            enrollment_id,
            AuditAction::StatusChanged,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;

        load_enrollment(conn, organization_id, enrollment_id).await
    }

    /// Operator action: seat a waitlisted enrollment if its group has room.
    pub async fn promote_waitlisted(
        &self,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .promote_waitlisted_in(&tx, organization_id, enrollment_id)
            .await;
        let enrollment = finish_tx(tx, result, "promote_waitlisted").await?;
        tracing::info!(enrollment_id, "waitlisted enrollment promoted");
        Ok(enrollment)
    }

    async fn promote_waitlisted_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let current = load_enrollment(conn, organization_id, enrollment_id).await?;
        if current.status != EnrollmentStatus::Waitlisted {
            return Err(DatabaseError::InvalidInput(format!(
                "enrollment {enrollment_id} is {}, not waitlisted",
                current.status
            )));
        }

        let sql = format!(
            "UPDATE enrollments SET status = 'active', started_at = ?1, updated_at = ?1
             WHERE id = ?2 AND status = 'waitlisted' AND {} = 'active'",
            admission_status_sql("enrollments.group_id")
        );
        let changed = conn
            .execute(&sql, libsql::params![self.now().to_rfc3339(), enrollment_id])
            .await?;
        if changed == 0 {
            let occupancy = match current.group_id.as_deref() {
                Some(group_id) => match find_group(conn, organization_id, group_id).await? {
                    Some(group) => Some(occupancy_of(conn, &group).await?),
                    None => None,
                },
                None => None,
            };
            return Err(DatabaseError::InvalidInput(format!(
                "no free seat for enrollment {enrollment_id}: {occupancy:?}"
            )));
        }

        let detail = StatusChangedDetail {
            from: EnrollmentStatus::Waitlisted.as_str().to_string(),
            to: EnrollmentStatus::Active.as_str().to_string(),
            reason: Some("promoted".into()),
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Enrollment,
            enrollment_id,
            AuditAction::StatusChanged,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;

        load_enrollment(conn, organization_id, enrollment_id).await
    }
}
