use serde::Serialize;
use serde_json::Value;

use cursus_core::entities::{Enrollment, ModuleState};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{CompleteArgs, ModuleTargetArgs};
use crate::context::AppContext;

#[derive(Debug, Serialize)]
struct ProgressResponse {
    enrollment: Enrollment,
    modules: Vec<ModuleState>,
}

/// Handle `cursus start`.
pub async fn handle_start(
    args: &ModuleTargetArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let progress = ctx
        .service
        .start_module(org, &args.enrollment, &args.module)
        .await?;
    Ok(serde_json::to_value(progress)?)
}

/// Handle `cursus complete`.
pub async fn handle_complete(
    args: &CompleteArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let completion = ctx
        .service
        .complete_module(org, &args.enrollment, &args.module, args.score)
        .await?;
    Ok(serde_json::to_value(completion)?)
}

/// Handle `cursus progress`.
pub async fn handle_progress(
    enrollment_id: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let enrollment = ctx.service.get_enrollment(org, enrollment_id).await?;
    let modules = ctx.service.get_progress(org, enrollment_id).await?;
    Ok(serde_json::to_value(ProgressResponse {
        enrollment,
        modules,
    })?)
}

/// Handle `cursus recompute`.
pub async fn handle_recompute(
    enrollment_id: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    Ok(serde_json::to_value(
        ctx.service
            .recompute_enrollment_progress(org, enrollment_id)
            .await?,
    )?)
}
