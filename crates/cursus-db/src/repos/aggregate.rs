//! Progress aggregator: derives an enrollment's percentage from its module
//! records with a full re-scan on every run.

use cursus_core::audit_detail::ProgressRecomputedDetail;
use cursus_core::entities::Enrollment;
use cursus_core::enums::{AuditAction, EnrollmentStatus, EntityType};

use crate::error::DatabaseError;
use crate::helpers::query_scalar_i64;
use crate::repos::enrollment::load_enrollment;
use crate::service::CursusService;
use crate::{begin_immediate, finish_tx};

/// `completed / total * 100`, or `None` when the course has no modules.
#[allow(clippy::cast_precision_loss)]
fn percentage(completed: i64, total: i64) -> Option<f64> {
    (total > 0).then(|| completed as f64 * 100.0 / total as f64)
}

impl CursusService {
    /// Recompute `progress` from completed module records. When every module
    /// is completed the enrollment becomes `completed` and `completed_at` is
    /// stamped. A course without modules leaves the enrollment untouched.
    pub async fn recompute_enrollment_progress(
        &self,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let conn = self.db().conn().await;
        self.recompute_on(&conn, organization_id, enrollment_id)
            .await
    }

    /// Run the recomputation in its own transaction on a connection the
    /// caller already holds.
    pub(crate) async fn recompute_on(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let tx = begin_immediate(conn).await?;
        let result = self
            .recompute_in(&tx, organization_id, enrollment_id)
            .await;
        finish_tx(tx, result, "recompute_enrollment_progress").await
    }

    async fn recompute_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Enrollment, DatabaseError> {
        let enrollment = load_enrollment(conn, organization_id, enrollment_id).await?;

        let total = query_scalar_i64(
            conn,
            "SELECT COUNT(*) FROM modules WHERE course_id = ?1",
            [enrollment.course_id.as_str()],
        )
        .await?;
        let completed = query_scalar_i64(
            conn,
            "SELECT COUNT(*) FROM module_progress p
             JOIN modules m ON m.id = p.module_id
             WHERE p.enrollment_id = ?1 AND m.course_id = ?2 AND p.status = 'completed'",
            [enrollment_id, enrollment.course_id.as_str()],
        )
        .await?;

        let Some(progress) = percentage(completed, total) else {
            return Ok(enrollment);
        };

        let now = self.now();
        let finished = completed >= total;
        if finished {
            conn.execute(
                "UPDATE enrollments SET progress = ?1, status = ?2, completed_at = ?3, updated_at = ?3
                 WHERE id = ?4",
                libsql::params![
                    progress,
                    EnrollmentStatus::Completed.as_str(),
                    now.to_rfc3339(),
                    enrollment_id
                ],
            )
            .await?;
        } else {
            conn.execute(
                "UPDATE enrollments SET progress = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![progress, now.to_rfc3339(), enrollment_id],
            )
            .await?;
        }

        let detail = ProgressRecomputedDetail {
            completed_modules: completed,
            total_modules: total,
            progress,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Enrollment,
            enrollment_id,
            AuditAction::ProgressRecomputed,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;

        if finished && enrollment.status != EnrollmentStatus::Completed {
            tracing::info!(enrollment_id, total, "enrollment completed");
        }

        load_enrollment(conn, organization_id, enrollment_id).await
    }
}
