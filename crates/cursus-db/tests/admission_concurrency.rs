//! Concurrent admission against one capacity-limited group.
//!
//! Each worker runs on its own thread with its own runtime and its own
//! connection to a shared on-disk database, so admissions genuinely race.

use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use cursus_core::enums::{EnrollmentStatus, ModuleType};
use cursus_db::repos::course::NewCourse;
use cursus_db::repos::enrollment::{EnrollmentFilter, NewEnrollment};
use cursus_db::repos::group::NewGroup;
use cursus_db::repos::module::NewModule;
use cursus_db::service::CursusService;

const CAPACITY: i64 = 3;
const LEARNERS: usize = 8;

struct Seeded {
    org_id: String,
    course_id: String,
    group_id: String,
    learner_ids: Vec<String>,
}

async fn seed(path: &str) -> Seeded {
    let svc = CursusService::new_local(path).await.unwrap();
    let org = svc.create_organization("Acme", None).await.unwrap();
    let course = svc
        .create_course(
            &org.id,
            &NewCourse {
                title: "Crowded".into(),
                ..NewCourse::default()
            },
        )
        .await
        .unwrap();
    svc.add_module(
        &org.id,
        &course.id,
        &NewModule {
            title: "Intro".into(),
            module_type: ModuleType::Video,
            duration_seconds: Some(300),
        },
    )
    .await
    .unwrap();
    let group = svc
        .create_group(
            &org.id,
            &NewGroup {
                name: "Small room".into(),
                capacity: Some(CAPACITY),
                course_id: Some(course.id.clone()),
                ..NewGroup::default()
            },
        )
        .await
        .unwrap();

    let mut learner_ids = Vec::with_capacity(LEARNERS);
    for i in 0..LEARNERS {
        let learner = svc
            .register_learner(&org.id, &format!("u{i}@example.com"), None)
            .await
            .unwrap();
        learner_ids.push(learner.id);
    }

    Seeded {
        org_id: org.id,
        course_id: course.id,
        group_id: group.id,
        learner_ids,
    }
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

#[test]
fn concurrent_enrollments_never_exceed_capacity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursus.db").to_string_lossy().into_owned();
    let seeded = Arc::new(block_on(seed(&path)));

    let barrier = Arc::new(Barrier::new(LEARNERS));
    let handles: Vec<_> = (0..LEARNERS)
        .map(|i| {
            let path = path.clone();
            let seeded = Arc::clone(&seeded);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                block_on(async move {
                    let svc = CursusService::new_local(&path).await.unwrap();
                    barrier.wait();
                    svc.enroll(
                        &seeded.org_id,
                        &NewEnrollment {
                            course_id: seeded.course_id.clone(),
                            learner_id: seeded.learner_ids[i].clone(),
                            group_id: Some(seeded.group_id.clone()),
                            metadata: None,
                        },
                    )
                    .await
                    .unwrap()
                    .status
                })
            })
        })
        .collect();

    let statuses: Vec<EnrollmentStatus> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();
    let active = statuses
        .iter()
        .filter(|s| **s == EnrollmentStatus::Active)
        .count();
    let waitlisted = statuses
        .iter()
        .filter(|s| **s == EnrollmentStatus::Waitlisted)
        .count();
    assert_eq!((active, waitlisted), (3, 5));

    let occupancy = block_on(async {
        let svc = CursusService::new_local(&path).await.unwrap();
        let listed = svc
            .list_enrollments(
                &seeded.org_id,
                &EnrollmentFilter {
                    group_id: Some(seeded.group_id.clone()),
                    ..EnrollmentFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), LEARNERS);
        svc.group_occupancy(&seeded.org_id, &seeded.group_id)
            .await
            .unwrap()
    });
    assert_eq!(occupancy.occupied, 3);
    assert_eq!(occupancy.waitlisted, 5);
    assert_eq!(occupancy.free_seats(), Some(0));
}
