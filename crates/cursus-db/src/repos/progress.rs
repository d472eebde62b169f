//! Progress tracker: per-module state for one enrollment.
//!
//! ```text
//! (no record) → in_progress → completed
//!                             completed → in_progress (retake)
//! ```
//!
//! A module at position `P` can only be started once every module of the
//! course at a lower position has a completed record for the enrollment.
//! The check and the write share one IMMEDIATE transaction.

use chrono::{DateTime, Utc};
use cursus_core::audit_detail::ModuleProgressDetail;
use cursus_core::entities::{Enrollment, Module, ModuleProgress, ModuleState};
use cursus_core::enums::{AuditAction, EntityType, ProgressStatus};
use cursus_core::ids::PREFIX_PROGRESS;
use serde::Serialize;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_optional_datetime};
use crate::repos::enrollment::load_enrollment;
use crate::repos::module::{find_module, modules_of_course};
use crate::service::CursusService;
use crate::{begin_immediate, finish_tx, generate_id};

const SELECT_COLS: &str = "id, enrollment_id, module_id, status, score, attempts, started_at, \
     completed_at, created_at, updated_at";

/// Result of [`CursusService::complete_module`]: the module record and the
/// enrollment after its aggregate was recomputed.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleCompletion {
    pub progress: ModuleProgress,
    pub enrollment: Enrollment,
}

fn row_to_progress(row: &libsql::Row) -> Result<ModuleProgress, DatabaseError> {
    Ok(ModuleProgress {
        id: row.get(0)?,
        enrollment_id: row.get(1)?,
        module_id: row.get(2)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        score: row.get::<Option<f64>>(4)?,
        attempts: row.get(5)?,
        started_at: parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?,
        completed_at: parse_optional_datetime(get_opt_string(row, 7)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(8)?)?,
        updated_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

async fn find_progress(
    conn: &libsql::Connection,
    enrollment_id: &str,
    module_id: &str,
) -> Result<Option<ModuleProgress>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM module_progress
                 WHERE enrollment_id = ?1 AND module_id = ?2"
            ),
            [enrollment_id, module_id],
        )
        .await?;
    rows.next()
        .await?
        .map(|row| row_to_progress(&row))
        .transpose()
}

/// Modules of the course below `position` without a completed record for
/// the enrollment, in position order.
async fn missing_prerequisites(
    conn: &libsql::Connection,
    enrollment_id: &str,
    module: &Module,
) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT m.id FROM modules m
             WHERE m.course_id = ?1 AND m.position < ?2
               AND NOT EXISTS (
                   SELECT 1 FROM module_progress p
                   WHERE p.enrollment_id = ?3 AND p.module_id = m.id AND p.status = 'completed'
               )
             ORDER BY m.position",
            libsql::params![module.course_id.as_str(), module.position, enrollment_id],
        )
        .await?;
    let mut missing = Vec::new();
    while let Some(row) = rows.next().await? {
        missing.push(row.get::<String>(0)?);
    }
    Ok(missing)
}

fn check_score(score: Option<f64>) -> Result<(), DatabaseError> {
    match score {
        Some(s) if !s.is_finite() => Err(DatabaseError::InvalidInput(format!(
            "score must be a finite number, got {s}"
        ))),
        _ => Ok(()),
    }
}

impl CursusService {
    /// Move a module to `in_progress` for an enrollment, creating its record
    /// on first touch. An existing `started_at` is never overwritten.
    pub async fn start_module(
        &self,
        organization_id: &str,
        enrollment_id: &str,
        module_id: &str,
    ) -> Result<ModuleProgress, DatabaseError> {
        let now = self.now();
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .start_and_record_in(&tx, organization_id, enrollment_id, module_id, now)
            .await;
        finish_tx(tx, result, "start_module").await
    }

    async fn start_and_record_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
        module_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ModuleProgress, DatabaseError> {
        let progress = self
            .start_module_in(conn, organization_id, enrollment_id, module_id, now)
            .await?;
        let detail = ModuleProgressDetail {
            enrollment_id: enrollment_id.to_string(),
            module_id: module_id.to_string(),
            score: progress.score,
            attempts: progress.attempts,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::ModuleProgress,
            &progress.id,
            AuditAction::ModuleStarted,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;
        Ok(progress)
    }

    async fn start_module_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
        module_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ModuleProgress, DatabaseError> {
        let enrollment = load_enrollment(conn, organization_id, enrollment_id).await?;
        let module = find_module(conn, organization_id, module_id)
            .await?
            .ok_or_else(|| {
                DatabaseError::InvalidInput(format!("module {module_id} does not exist"))
            })?;
        if module.course_id != enrollment.course_id {
            return Err(DatabaseError::InvalidInput(format!(
                "module {module_id} does not belong to course {}",
                enrollment.course_id
            )));
        }

        let missing = missing_prerequisites(conn, enrollment_id, &module).await?;
        if !missing.is_empty() {
            return Err(DatabaseError::Blocked {
                module_id: module_id.to_string(),
                missing,
            });
        }

        match find_progress(conn, enrollment_id, module_id).await? {
            None => {
                let id = generate_id(conn, PREFIX_PROGRESS).await?;
                conn.execute(
                    &format!(
                        "INSERT INTO module_progress ({SELECT_COLS})
                         VALUES (?1, ?2, ?3, ?4, NULL, 0, ?5, NULL, ?5, ?5)"
                    ),
                    libsql::params![
                        id.as_str(),
                        enrollment_id,
                        module_id,
                        ProgressStatus::InProgress.as_str(),
                        now.to_rfc3339()
                    ],
                )
                .await?;
                tracing::debug!(enrollment_id, module_id, "module started");
                Ok(ModuleProgress {
                    id,
                    enrollment_id: enrollment_id.to_string(),
                    module_id: module_id.to_string(),
                    status: ProgressStatus::InProgress,
                    score: None,
                    attempts: 0,
                    started_at: Some(now),
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                })
            }
            Some(existing) => {
                debug_assert!(existing.status.can_transition_to(ProgressStatus::InProgress));
                conn.execute(
                    "UPDATE module_progress
                     SET status = ?1, started_at = COALESCE(started_at, ?2), updated_at = ?2
                     WHERE id = ?3",
                    libsql::params![
                        ProgressStatus::InProgress.as_str(),
                        now.to_rfc3339(),
                        existing.id.as_str()
                    ],
                )
                .await?;
                tracing::debug!(enrollment_id, module_id, from = %existing.status, "module restarted");
                Ok(ModuleProgress {
                    status: ProgressStatus::InProgress,
                    started_at: existing.started_at.or(Some(now)),
                    updated_at: now,
                    ..existing
                })
            }
        }
    }

    /// Complete a module, starting it first when needed, then recompute the
    /// enrollment's aggregate progress.
    ///
    /// A supplied score is recorded and increments `attempts` on every call.
    /// The module write is committed before aggregation runs; an aggregation
    /// failure is returned but does not undo it.
    pub async fn complete_module(
        &self,
        organization_id: &str,
        enrollment_id: &str,
        module_id: &str,
        score: Option<f64>,
    ) -> Result<ModuleCompletion, DatabaseError> {
        check_score(score)?;
        let now = self.now();

        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .complete_module_in(&tx, organization_id, enrollment_id, module_id, score, now)
            .await;
        let progress = finish_tx(tx, result, "complete_module").await?;

        let enrollment = self
            .recompute_on(&conn, organization_id, enrollment_id)
            .await?;
        Ok(ModuleCompletion {
            progress,
            enrollment,
        })
    }

    async fn complete_module_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        enrollment_id: &str,
        module_id: &str,
        score: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<ModuleProgress, DatabaseError> {
        let started = self
            .start_module_in(conn, organization_id, enrollment_id, module_id, now)
            .await?;

        if let Some(score) = score {
            conn.execute(
                "UPDATE module_progress
                 SET status = ?1, completed_at = ?2, updated_at = ?2,
                     score = ?3, attempts = attempts + 1
                 WHERE id = ?4",
                libsql::params![
                    ProgressStatus::Completed.as_str(),
                    now.to_rfc3339(),
                    score,
                    started.id.as_str()
                ],
            )
            .await?;
        } else {
            conn.execute(
                "UPDATE module_progress SET status = ?1, completed_at = ?2, updated_at = ?2
                 WHERE id = ?3",
                libsql::params![
                    ProgressStatus::Completed.as_str(),
                    now.to_rfc3339(),
                    started.id.as_str()
                ],
            )
            .await?;
        }

        let completed = ModuleProgress {
            status: ProgressStatus::Completed,
            completed_at: Some(now),
            score: score.or(started.score),
            attempts: started.attempts + i64::from(score.is_some()),
            updated_at: now,
            ..started
        };
        tracing::debug!(
            enrollment_id,
            module_id,
            attempts = completed.attempts,
            "module completed"
        );

        let detail = ModuleProgressDetail {
            enrollment_id: enrollment_id.to_string(),
            module_id: module_id.to_string(),
            score,
            attempts: completed.attempts,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::ModuleProgress,
            &completed.id,
            AuditAction::ModuleCompleted,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;

        Ok(completed)
    }

    /// Every module of the enrollment's course in position order, paired
    /// with its progress record. Absent records read as `not_started`.
    pub async fn get_progress(
        &self,
        organization_id: &str,
        enrollment_id: &str,
    ) -> Result<Vec<ModuleState>, DatabaseError> {
        let conn = self.db().conn().await;
        let enrollment = load_enrollment(&conn, organization_id, enrollment_id).await?;
        let modules = modules_of_course(&conn, &enrollment.course_id).await?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM module_progress WHERE enrollment_id = ?1"
                ),
                [enrollment_id],
            )
            .await?;
        let mut records = std::collections::HashMap::new();
        while let Some(row) = rows.next().await? {
            let record = row_to_progress(&row)?;
            records.insert(record.module_id.clone(), record);
        }

        Ok(modules
            .into_iter()
            .map(|module| {
                let progress = records.remove(&module.id);
                ModuleState { module, progress }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::enrollment::NewEnrollment;
    use crate::test_support::helpers::{
        seed_course, seed_learner, seed_org, test_service, test_service_with_clock,
    };
    use chrono::Duration;
    use cursus_core::enums::EnrollmentStatus;
    use pretty_assertions::assert_eq;

    async fn enrolled(
        svc: &CursusService,
        modules: usize,
    ) -> (String, Enrollment, Vec<Module>) {
        let org = seed_org(svc, "acme").await;
        let learner = seed_learner(svc, &org.id, "ada@example.com").await;
        let (course, modules) = seed_course(svc, &org.id, "Basics", modules).await;
        let enrollment = svc
            .enroll(
                &org.id,
                &NewEnrollment {
                    course_id: course.id.clone(),
                    learner_id: learner.id.clone(),
                    ..NewEnrollment::default()
                },
            )
            .await
            .unwrap();
        (org.id, enrollment, modules)
    }

    #[tokio::test]
    async fn first_module_never_blocked() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 3).await;

        let progress = svc
            .start_module(&org, &enrollment.id, &modules[0].id)
            .await
            .unwrap();
        assert!(progress.id.starts_with("mpr-"));
        assert_eq!(progress.status, ProgressStatus::InProgress);
        assert_eq!(progress.attempts, 0);
        assert_eq!(progress.started_at, Some(svc.now()));
    }

    #[tokio::test]
    async fn later_module_blocked_lists_missing_in_order() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 3).await;

        let err = svc
            .start_module(&org, &enrollment.id, &modules[2].id)
            .await
            .unwrap_err();
        match err {
            DatabaseError::Blocked { module_id, missing } => {
                assert_eq!(module_id, modules[2].id);
                assert_eq!(missing, vec![modules[0].id.clone(), modules[1].id.clone()]);
            }
            other => panic!("expected Blocked, got {other:?}"),
        }

        // A blocked start leaves no record behind.
        let states = svc.get_progress(&org, &enrollment.id).await.unwrap();
        assert!(states.iter().all(|s| s.progress.is_none()));
    }

    #[tokio::test]
    async fn in_progress_prerequisite_still_blocks() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 2).await;

        svc.start_module(&org, &enrollment.id, &modules[0].id)
            .await
            .unwrap();
        let err = svc
            .start_module(&org, &enrollment.id, &modules[1].id)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Blocked { .. }));
    }

    #[tokio::test]
    async fn restart_keeps_original_start_time() {
        let (svc, clock) = test_service_with_clock().await;
        let (org, enrollment, modules) = enrolled(&svc, 1).await;
        let first = svc
            .start_module(&org, &enrollment.id, &modules[0].id)
            .await
            .unwrap();

        clock.advance(Duration::hours(2));
        let again = svc
            .start_module(&org, &enrollment.id, &modules[0].id)
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.started_at, first.started_at);
        assert_eq!(again.updated_at, svc.now());
    }

    #[tokio::test]
    async fn start_after_completion_reopens_module() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 1).await;
        svc.complete_module(&org, &enrollment.id, &modules[0].id, None)
            .await
            .unwrap();

        let reopened = svc
            .start_module(&org, &enrollment.id, &modules[0].id)
            .await
            .unwrap();
        assert_eq!(reopened.status, ProgressStatus::InProgress);
    }

    #[tokio::test]
    async fn complete_unstarted_first_module_in_one_call() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 2).await;

        let outcome = svc
            .complete_module(&org, &enrollment.id, &modules[0].id, Some(72.5))
            .await
            .unwrap();
        assert_eq!(outcome.progress.status, ProgressStatus::Completed);
        assert_eq!(outcome.progress.score, Some(72.5));
        assert_eq!(outcome.progress.attempts, 1);
        assert_eq!(outcome.progress.started_at, Some(svc.now()));
        assert_eq!(outcome.progress.completed_at, Some(svc.now()));
        assert!((outcome.enrollment.progress - 50.0).abs() < 1e-9);
        assert_eq!(outcome.enrollment.status, EnrollmentStatus::Active);
    }

    #[tokio::test]
    async fn scored_completions_count_attempts() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 2).await;
        let module = &modules[0].id;

        svc.complete_module(&org, &enrollment.id, module, Some(40.0))
            .await
            .unwrap();
        svc.complete_module(&org, &enrollment.id, module, None)
            .await
            .unwrap();
        let third = svc
            .complete_module(&org, &enrollment.id, module, Some(90.0))
            .await
            .unwrap();

        assert_eq!(third.progress.status, ProgressStatus::Completed);
        assert_eq!(third.progress.attempts, 2);
        assert_eq!(third.progress.score, Some(90.0));

        let states = svc.get_progress(&org, &enrollment.id).await.unwrap();
        assert_eq!(states[0].progress.as_ref().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn non_finite_score_rejected() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 1).await;
        let err = svc
            .complete_module(&org, &enrollment.id, &modules[0].id, Some(f64::INFINITY))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn module_from_other_course_is_invalid() {
        let svc = test_service().await;
        let (org, enrollment, _) = enrolled(&svc, 1).await;
        let (_, other_modules) = seed_course(&svc, &org, "Other", 1).await;

        let err = svc
            .start_module(&org, &enrollment.id, &other_modules[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));

        let err = svc
            .start_module(&org, &enrollment.id, "mod-00000000")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_enrollment_is_not_found() {
        let svc = test_service().await;
        let (org, _, modules) = enrolled(&svc, 1).await;
        let err = svc
            .start_module(&org, "enr-00000000", &modules[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn get_progress_is_read_only_projection() {
        let svc = test_service().await;
        let (org, enrollment, modules) = enrolled(&svc, 3).await;
        svc.complete_module(&org, &enrollment.id, &modules[0].id, None)
            .await
            .unwrap();

        let states = svc.get_progress(&org, &enrollment.id).await.unwrap();
        let statuses: Vec<ProgressStatus> = states.iter().map(ModuleState::status).collect();
        assert_eq!(
            statuses,
            vec![
                ProgressStatus::Completed,
                ProgressStatus::NotStarted,
                ProgressStatus::NotStarted
            ]
        );

        // Reading did not create records.
        let again = svc.get_progress(&org, &enrollment.id).await.unwrap();
        assert_eq!(again.iter().filter(|s| s.progress.is_some()).count(), 1);
    }
}
