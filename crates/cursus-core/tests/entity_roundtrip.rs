//! Serde roundtrip and JsonSchema validation tests for entity types.

use chrono::Utc;
use cursus_core::audit_detail::{AdmissionDetail, ModuleProgressDetail, StatusChangedDetail};
use cursus_core::entities::*;
use cursus_core::enums::*;
use cursus_core::errors::ErrorKind;
use schemars::schema_for;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            pretty_assertions::assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

fn sample_module(position: i64) -> Module {
    Module {
        id: format!("mod-0000000{position}"),
        course_id: "crs-a3f8b2c1".into(),
        title: format!("Module {position}"),
        module_type: ModuleType::Video,
        position,
        duration_seconds: Some(600),
        status: ModuleStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

roundtrip_and_validate!(
    course_roundtrip,
    Course,
    Course {
        id: "crs-a3f8b2c1".into(),
        organization_id: "org-00c0ffee".into(),
        title: "Fire Safety 101".into(),
        slug: "fire-safety-101".into(),
        description: None,
        status: CourseStatus::Published,
        version: 2,
        published_at: Some(Utc::now()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(module_roundtrip, Module, sample_module(0));

roundtrip_and_validate!(
    group_roundtrip,
    Group,
    Group {
        id: "grp-11223344".into(),
        organization_id: "org-00c0ffee".into(),
        course_id: Some("crs-a3f8b2c1".into()),
        name: "Spring cohort".into(),
        description: Some("Evening sessions".into()),
        capacity: Some(25),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    enrollment_roundtrip,
    Enrollment,
    Enrollment {
        id: "enr-deadbeef".into(),
        organization_id: "org-00c0ffee".into(),
        course_id: "crs-a3f8b2c1".into(),
        learner_id: "lrn-12345678".into(),
        group_id: None,
        status: EnrollmentStatus::Active,
        progress: 33.5,
        started_at: Some(Utc::now()),
        completed_at: None,
        metadata: Some(serde_json::json!({"source": "import"})),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    module_state_roundtrip,
    ModuleState,
    ModuleState {
        module: sample_module(1),
        progress: Some(ModuleProgress {
            id: "mpr-0badf00d".into(),
            enrollment_id: "enr-deadbeef".into(),
            module_id: "mod-00000001".into(),
            status: ProgressStatus::Completed,
            score: Some(87.5),
            attempts: 2,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }),
    }
);

roundtrip_and_validate!(
    audit_entry_roundtrip,
    AuditEntry,
    AuditEntry {
        id: "aud-00000001".into(),
        organization_id: "org-00c0ffee".into(),
        entity_type: EntityType::Enrollment,
        entity_id: "enr-deadbeef".into(),
        action: AuditAction::StatusChanged,
        detail: Some(
            serde_json::to_value(StatusChangedDetail {
                from: "active".into(),
                to: "cancelled".into(),
                reason: None,
            })
            .unwrap()
        ),
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    admission_detail_roundtrip,
    AdmissionDetail,
    AdmissionDetail {
        course_id: "crs-a3f8b2c1".into(),
        learner_id: "lrn-12345678".into(),
        group_id: Some("grp-11223344".into()),
        status: "waitlisted".into(),
    }
);

roundtrip_and_validate!(
    module_progress_detail_roundtrip,
    ModuleProgressDetail,
    ModuleProgressDetail {
        enrollment_id: "enr-deadbeef".into(),
        module_id: "mod-00000001".into(),
        score: None,
        attempts: 0,
    }
);

#[test]
fn module_state_without_record_is_not_started() {
    let state = ModuleState {
        module: sample_module(3),
        progress: None,
    };
    assert_eq!(state.status(), ProgressStatus::NotStarted);
    assert!(!state.is_completed());
}

#[test]
fn occupancy_free_seats() {
    let occupancy = GroupOccupancy {
        group_id: "grp-11223344".into(),
        capacity: Some(2),
        occupied: 3,
        waitlisted: 1,
    };
    assert_eq!(occupancy.free_seats(), Some(0));

    let unlimited = GroupOccupancy {
        capacity: None,
        ..occupancy
    };
    assert_eq!(unlimited.free_seats(), None);
}

#[test]
fn error_kind_codes_are_stable() {
    assert_eq!(ErrorKind::AlreadyEnrolled.as_str(), "already_enrolled");
    assert_eq!(
        serde_json::to_string(&ErrorKind::Blocked).unwrap(),
        "\"blocked\""
    );
    assert!(ErrorKind::NotFound.is_domain());
    assert!(!ErrorKind::Internal.is_domain());
}
