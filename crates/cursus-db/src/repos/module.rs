//! Module repository: the ordered module list of a course.
//!
//! Positions are explicit integer ranks. New modules append at
//! `max(position) + 1`; removal leaves gaps; reorder rewrites the ranks
//! `0..n` from a permutation.

use std::collections::HashMap;

use cursus_core::audit_detail::ReorderedDetail;
use cursus_core::entities::Module;
use cursus_core::enums::{AuditAction, EntityType, ModuleStatus, ModuleType};
use cursus_core::ids::PREFIX_MODULE;

use crate::error::DatabaseError;
use crate::helpers::{parse_datetime, parse_enum, query_scalar_i64, require_text};
use crate::repos::course::{ensure_course, load_course};
use crate::service::CursusService;
use crate::{begin_immediate, finish_tx, generate_id};
use crate::updates::module::ModuleUpdate;

const SELECT_COLS: &str = "m.id, m.course_id, m.title, m.module_type, m.position, \
     m.duration_seconds, m.status, m.created_at, m.updated_at";

/// Input for [`CursusService::add_module`].
#[derive(Debug, Clone)]
pub struct NewModule {
    pub title: String,
    pub module_type: ModuleType,
    pub duration_seconds: Option<i64>,
}

pub(crate) fn row_to_module(row: &libsql::Row) -> Result<Module, DatabaseError> {
    Ok(Module {
        id: row.get(0)?,
        course_id: row.get(1)?,
        title: row.get(2)?,
        module_type: parse_enum(&row.get::<String>(3)?)?,
        position: row.get(4)?,
        duration_seconds: row.get::<Option<i64>>(5)?,
        status: parse_enum(&row.get::<String>(6)?)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

/// Look up a module through its course's organization.
pub(crate) async fn find_module(
    conn: &libsql::Connection,
    organization_id: &str,
    module_id: &str,
) -> Result<Option<Module>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM modules m
                 JOIN courses c ON c.id = m.course_id
                 WHERE m.id = ?1 AND c.organization_id = ?2"
            ),
            [module_id, organization_id],
        )
        .await?;
    rows.next().await?.map(|row| row_to_module(&row)).transpose()
}

pub(crate) async fn load_module(
    conn: &libsql::Connection,
    organization_id: &str,
    module_id: &str,
) -> Result<Module, DatabaseError> {
    find_module(conn, organization_id, module_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found(EntityType::Module, module_id))
}

pub(crate) async fn modules_of_course(
    conn: &libsql::Connection,
    course_id: &str,
) -> Result<Vec<Module>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM modules m WHERE m.course_id = ?1 ORDER BY m.position"),
            [course_id],
        )
        .await?;
    let mut modules = Vec::new();
    while let Some(row) = rows.next().await? {
        modules.push(row_to_module(&row)?);
    }
    Ok(modules)
}

fn check_duration(duration_seconds: Option<i64>) -> Result<(), DatabaseError> {
    match duration_seconds {
        Some(d) if d < 0 => Err(DatabaseError::InvalidInput(format!(
            "duration must not be negative, got {d}"
        ))),
        _ => Ok(()),
    }
}

impl CursusService {
    /// Append a module to the end of a course.
    pub async fn add_module(
        &self,
        organization_id: &str,
        course_id: &str,
        input: &NewModule,
    ) -> Result<Module, DatabaseError> {
        let title = require_text("module title", &input.title)?;
        check_duration(input.duration_seconds)?;

        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .add_module_in(&tx, organization_id, course_id, title, input)
            .await;
        finish_tx(tx, result, "add_module").await
    }

    async fn add_module_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        course_id: &str,
        title: &str,
        input: &NewModule,
    ) -> Result<Module, DatabaseError> {
        ensure_course(conn, organization_id, course_id).await?;

        let position = query_scalar_i64(
            conn,
            "SELECT COALESCE(MAX(position), -1) + 1 FROM modules WHERE course_id = ?1",
            [course_id],
        )
        .await?;

        let now = self.now();
        let id = generate_id(conn, PREFIX_MODULE).await?;
        conn.execute(
            "INSERT INTO modules (id, course_id, title, module_type, position, duration_seconds,
                                  status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            libsql::params![
                id.as_str(),
                course_id,
                title,
                input.module_type.as_str(),
                position,
                input.duration_seconds,
                ModuleStatus::Active.as_str(),
                now.to_rfc3339()
            ],
        )
        .await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Module,
            &id,
            AuditAction::Created,
            None,
        )
        .await?;

        Ok(Module {
            id,
            course_id: course_id.to_string(),
            title: title.to_string(),
            module_type: input.module_type,
            position,
            duration_seconds: input.duration_seconds,
            status: ModuleStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_module(
        &self,
        organization_id: &str,
        module_id: &str,
    ) -> Result<Module, DatabaseError> {
        load_module(&*self.db().conn().await, organization_id, module_id).await
    }

    /// Modules of a course in position order.
    pub async fn list_modules(
        &self,
        organization_id: &str,
        course_id: &str,
    ) -> Result<Vec<Module>, DatabaseError> {
        let conn = self.db().conn().await;
        load_course(&conn, organization_id, course_id).await?;
        modules_of_course(&conn, course_id).await
    }

    pub async fn update_module(
        &self,
        organization_id: &str,
        module_id: &str,
        update: ModuleUpdate,
    ) -> Result<Module, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .update_module_in(&tx, organization_id, module_id, &update)
            .await;
        finish_tx(tx, result, "update_module").await
    }

    async fn update_module_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        module_id: &str,
        update: &ModuleUpdate,
    ) -> Result<Module, DatabaseError> {
        let current = load_module(conn, organization_id, module_id).await?;

        let mut sets = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();
        let mut idx = 1usize;

        if let Some(ref title) = update.title {
            sets.push(format!("title = ?{idx}"));
            params.push(require_text("module title", title)?.into());
            idx += 1;
        }
        if let Some(module_type) = update.module_type {
            sets.push(format!("module_type = ?{idx}"));
            params.push(module_type.as_str().into());
            idx += 1;
        }
        if let Some(duration_seconds) = update.duration_seconds {
            check_duration(duration_seconds)?;
            sets.push(format!("duration_seconds = ?{idx}"));
            params.push(duration_seconds.map_or(libsql::Value::Null, Into::into));
            idx += 1;
        }
        if let Some(status) = update.status {
            sets.push(format!("status = ?{idx}"));
            params.push(status.as_str().into());
            idx += 1;
        }

        if sets.is_empty() {
            return Ok(current);
        }

        sets.push(format!("updated_at = ?{idx}"));
        params.push(self.now().to_rfc3339().into());
        idx += 1;

        params.push(module_id.into());
        let sql = format!("UPDATE modules SET {} WHERE id = ?{idx}", sets.join(", "));
        conn.execute(&sql, libsql::params_from_iter(params)).await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Module,
            module_id,
            AuditAction::Updated,
            Some(serde_json::to_value(update)?),
        )
        .await?;

        load_module(conn, organization_id, module_id).await
    }

    /// Assign positions `0..n` following `ordered_ids`, which must be a
    /// permutation of the course's current modules. Only modules whose
    /// position changes are written.
    pub async fn reorder_modules(
        &self,
        organization_id: &str,
        course_id: &str,
        ordered_ids: &[String],
    ) -> Result<Vec<Module>, DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self
            .reorder_modules_in(&tx, organization_id, course_id, ordered_ids)
            .await;
        let moved = finish_tx(tx, result, "reorder_modules").await?;
        tracing::debug!(course_id, moved, "modules reordered");
        modules_of_course(&conn, course_id).await
    }

    async fn reorder_modules_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        course_id: &str,
        ordered_ids: &[String],
    ) -> Result<u32, DatabaseError> {
        ensure_course(conn, organization_id, course_id).await?;
        let current = modules_of_course(conn, course_id).await?;

        if ordered_ids.len() != current.len() {
            return Err(DatabaseError::InvalidInput(format!(
                "reorder expects {} module ids, got {}",
                current.len(),
                ordered_ids.len()
            )));
        }

        let positions: HashMap<&str, i64> = current
            .iter()
            .map(|m| (m.id.as_str(), m.position))
            .collect();
        let mut seen = std::collections::HashSet::with_capacity(ordered_ids.len());
        let mut changed: Vec<(&str, i64)> = Vec::new();
        for (rank, id) in (0_i64..).zip(ordered_ids) {
            let Some(&old) = positions.get(id.as_str()) else {
                return Err(DatabaseError::InvalidInput(format!(
                    "module {id} is not part of course {course_id}"
                )));
            };
            if !seen.insert(id.as_str()) {
                return Err(DatabaseError::InvalidInput(format!(
                    "module {id} appears more than once"
                )));
            }
            if old != rank {
                changed.push((id.as_str(), rank));
            }
        }

        if changed.is_empty() {
            return Ok(0);
        }

        // UNIQUE(course_id, position) must hold after every statement, so
        // moved modules park on negative ranks first.
        let now = self.now().to_rfc3339();
        for &(id, rank) in &changed {
            conn.execute(
                "UPDATE modules SET position = ?1 WHERE id = ?2",
                libsql::params![-(rank + 1), id],
            )
            .await?;
        }
        for &(id, rank) in &changed {
            conn.execute(
                "UPDATE modules SET position = ?1, updated_at = ?2 WHERE id = ?3",
                libsql::params![rank, now.as_str(), id],
            )
            .await?;
        }

        let moved = u32::try_from(changed.len()).unwrap_or(u32::MAX);
        let detail = ReorderedDetail {
            module_ids: ordered_ids.to_vec(),
            moved,
        };
        self.record_audit(
            conn,
            organization_id,
            EntityType::Course,
            course_id,
            AuditAction::Reordered,
            Some(serde_json::to_value(&detail)?),
        )
        .await?;
        Ok(moved)
    }

    /// Delete a module together with every progress record on it. Remaining
    /// positions are left as they are.
    pub async fn remove_module(
        &self,
        organization_id: &str,
        module_id: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.db().conn().await;
        let tx = begin_immediate(&conn).await?;
        let result = self.remove_module_in(&tx, organization_id, module_id).await;
        let progress_records = finish_tx(tx, result, "remove_module").await?;
        tracing::info!(module_id, progress_records, "module removed");
        Ok(())
    }

    async fn remove_module_in(
        &self,
        conn: &libsql::Connection,
        organization_id: &str,
        module_id: &str,
    ) -> Result<u64, DatabaseError> {
        load_module(conn, organization_id, module_id).await?;

        let progress_records = conn
            .execute("DELETE FROM module_progress WHERE module_id = ?1", [module_id])
            .await?;
        conn.execute("DELETE FROM modules WHERE id = ?1", [module_id])
            .await?;

        self.record_audit(
            conn,
            organization_id,
            EntityType::Module,
            module_id,
            AuditAction::Deleted,
            None,
        )
        .await?;
        Ok(progress_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{seed_course, seed_org, test_service};
    use crate::updates::module::ModuleUpdateBuilder;
    use pretty_assertions::assert_eq;

    fn positions(modules: &[Module]) -> Vec<i64> {
        modules.iter().map(|m| m.position).collect()
    }

    fn ids(modules: &[Module]) -> Vec<String> {
        modules.iter().map(|m| m.id.clone()).collect()
    }

    #[tokio::test]
    async fn add_module_appends_dense_positions() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, modules) = seed_course(&svc, &org.id, "Dense", 4).await;

        assert_eq!(positions(&modules), vec![0, 1, 2, 3]);
        let listed = svc.list_modules(&org.id, &course.id).await.unwrap();
        assert_eq!(ids(&listed), ids(&modules));
    }

    #[tokio::test]
    async fn add_module_to_foreign_course_is_invalid() {
        let svc = test_service().await;
        let acme = seed_org(&svc, "acme").await;
        let globex = seed_org(&svc, "globex").await;
        let (course, _) = seed_course(&svc, &acme.id, "Private", 0).await;

        let err = svc
            .add_module(
                &globex.id,
                &course.id,
                &NewModule {
                    title: "Sneaky".into(),
                    module_type: ModuleType::Pdf,
                    duration_seconds: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_module_type_is_invalid_input() {
        let err: DatabaseError = "podcast".parse::<ModuleType>().unwrap_err().into();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn negative_duration_is_invalid() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, _) = seed_course(&svc, &org.id, "Timed", 0).await;
        let err = svc
            .add_module(
                &org.id,
                &course.id,
                &NewModule {
                    title: "Backwards".into(),
                    module_type: ModuleType::Video,
                    duration_seconds: Some(-5),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn append_after_gap_uses_max_plus_one() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, modules) = seed_course(&svc, &org.id, "Gappy", 3).await;

        svc.remove_module(&org.id, &modules[1].id).await.unwrap();
        let added = svc
            .add_module(
                &org.id,
                &course.id,
                &NewModule {
                    title: "Appendix".into(),
                    module_type: ModuleType::Article,
                    duration_seconds: Some(300),
                },
            )
            .await
            .unwrap();
        assert_eq!(added.position, 3);

        let listed = svc.list_modules(&org.id, &course.id).await.unwrap();
        assert_eq!(positions(&listed), vec![0, 2, 3]);
    }

    #[tokio::test]
    async fn update_module_keeps_position() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (_, modules) = seed_course(&svc, &org.id, "Editable", 2).await;

        let update = ModuleUpdateBuilder::new()
            .title("Renamed")
            .module_type(ModuleType::Quiz)
            .status(ModuleStatus::Archived)
            .build();
        let updated = svc
            .update_module(&org.id, &modules[1].id, update)
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.module_type, ModuleType::Quiz);
        assert_eq!(updated.status, ModuleStatus::Archived);
        assert_eq!(updated.position, 1);
    }

    #[tokio::test]
    async fn reorder_applies_permutation() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, modules) = seed_course(&svc, &org.id, "Shuffle", 3).await;

        let order = vec![
            modules[2].id.clone(),
            modules[0].id.clone(),
            modules[1].id.clone(),
        ];
        let reordered = svc
            .reorder_modules(&org.id, &course.id, &order)
            .await
            .unwrap();
        assert_eq!(ids(&reordered), order);
        assert_eq!(positions(&reordered), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn reorder_compacts_gaps() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, modules) = seed_course(&svc, &org.id, "Compact", 3).await;
        svc.remove_module(&org.id, &modules[0].id).await.unwrap();

        let order = vec![modules[1].id.clone(), modules[2].id.clone()];
        let reordered = svc
            .reorder_modules(&org.id, &course.id, &order)
            .await
            .unwrap();
        assert_eq!(positions(&reordered), vec![0, 1]);
    }

    #[tokio::test]
    async fn reorder_rejects_non_permutations() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, modules) = seed_course(&svc, &org.id, "Strict", 3).await;

        let short = vec![modules[0].id.clone(), modules[1].id.clone()];
        let duplicate = vec![
            modules[0].id.clone(),
            modules[0].id.clone(),
            modules[1].id.clone(),
        ];
        let unknown = vec![
            modules[0].id.clone(),
            modules[1].id.clone(),
            "mod-ffffffff".to_string(),
        ];
        for order in [short, duplicate, unknown] {
            let err = svc
                .reorder_modules(&org.id, &course.id, &order)
                .await
                .unwrap_err();
            assert!(matches!(err, DatabaseError::InvalidInput(_)), "{order:?}");
        }

        // Nothing moved.
        let listed = svc.list_modules(&org.id, &course.id).await.unwrap();
        assert_eq!(ids(&listed), ids(&modules));
    }

    #[tokio::test]
    async fn identity_reorder_writes_nothing() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let (course, modules) = seed_course(&svc, &org.id, "Stable", 3).await;

        let reordered = svc
            .reorder_modules(&org.id, &course.id, &ids(&modules))
            .await
            .unwrap();
        assert_eq!(reordered, modules);
    }

    #[tokio::test]
    async fn remove_missing_module_is_not_found() {
        let svc = test_service().await;
        let org = seed_org(&svc, "acme").await;
        let err = svc.remove_module(&org.id, "mod-00000000").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
