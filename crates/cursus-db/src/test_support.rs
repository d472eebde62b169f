//! Shared test utilities for cursus-db unit tests.

pub(crate) mod helpers {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use cursus_core::clock::FixedClock;
    use cursus_core::entities::{Course, Learner, Module, Organization};
    use cursus_core::enums::ModuleType;

    use crate::CursusDb;
    use crate::repos::course::NewCourse;
    use crate::repos::module::NewModule;
    use crate::service::CursusService;

    /// Instant every test service starts at.
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    /// In-memory service on a clock pinned to [`epoch`].
    pub async fn test_service() -> CursusService {
        test_service_with_clock().await.0
    }

    /// In-memory service plus a handle to move its clock.
    pub async fn test_service_with_clock() -> (CursusService, Arc<FixedClock>) {
        let db = CursusDb::open_local(":memory:").await.unwrap();
        let clock = Arc::new(FixedClock::new(epoch()));
        let svc = CursusService::from_db(db).with_clock(clock.clone());
        (svc, clock)
    }

    pub async fn seed_org(svc: &CursusService, slug: &str) -> Organization {
        svc.create_organization(&format!("Org {slug}"), Some(slug))
            .await
            .unwrap()
    }

    pub async fn seed_learner(svc: &CursusService, org_id: &str, email: &str) -> Learner {
        svc.register_learner(org_id, email, None).await.unwrap()
    }

    /// A draft course with `modules` video modules at positions `0..modules`.
    pub async fn seed_course(
        svc: &CursusService,
        org_id: &str,
        title: &str,
        modules: usize,
    ) -> (Course, Vec<Module>) {
        let course = svc
            .create_course(
                org_id,
                &NewCourse {
                    title: title.into(),
                    ..NewCourse::default()
                },
            )
            .await
            .unwrap();
        let mut added = Vec::with_capacity(modules);
        for i in 0..modules {
            added.push(
                svc.add_module(
                    org_id,
                    &course.id,
                    &NewModule {
                        title: format!("{title} part {i}"),
                        module_type: ModuleType::Video,
                        duration_seconds: Some(600),
                    },
                )
                .await
                .unwrap(),
            );
        }
        (course, added)
    }
}
