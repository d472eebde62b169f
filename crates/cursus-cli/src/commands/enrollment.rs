use cursus_core::enums::EnrollmentStatus;
use cursus_db::repos::enrollment::{EnrollmentFilter, NewEnrollment};
use serde_json::Value;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{EnrollArgs, EnrollmentsArgs};
use crate::commands::shared::parse::{parse_metadata, parse_optional_enum};
use crate::context::AppContext;

/// Handle `cursus enroll`.
pub async fn handle_enroll(
    args: &EnrollArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let input = NewEnrollment {
        course_id: args.course.clone(),
        learner_id: args.learner.clone(),
        group_id: args.group.clone(),
        metadata: parse_metadata(args.metadata.as_deref())?,
    };
    let enrollment = ctx.service.enroll(org, &input).await?;
    Ok(serde_json::to_value(enrollment)?)
}

/// Handle `cursus enrollments`.
pub async fn handle_list(
    args: &EnrollmentsArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let filter = EnrollmentFilter {
        course_id: args.course.clone(),
        learner_id: args.learner.clone(),
        group_id: args.group.clone(),
        status: parse_optional_enum::<EnrollmentStatus>(args.status.as_deref(), "status")?,
        limit: flags.limit,
    };
    let enrollments = ctx.service.list_enrollments(org, &filter).await?;
    Ok(serde_json::to_value(enrollments)?)
}

/// Handle `cursus cancel`.
pub async fn handle_cancel(
    id: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    Ok(serde_json::to_value(
        ctx.service.cancel_enrollment(org, id).await?,
    )?)
}

/// Handle `cursus promote`.
pub async fn handle_promote(
    id: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    Ok(serde_json::to_value(
        ctx.service.promote_waitlisted(org, id).await?,
    )?)
}
