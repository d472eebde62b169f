use serde_json::Value;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::{LearnerCommands, OrgCommands};
use crate::context::AppContext;

/// Handle `cursus org`.
pub async fn handle_org(action: &OrgCommands, ctx: &AppContext) -> anyhow::Result<Value> {
    let org = match action {
        OrgCommands::Create { name, slug } => {
            ctx.service
                .create_organization(name, slug.as_deref())
                .await?
        }
        OrgCommands::Get { id } => ctx.service.get_organization(id).await?,
    };
    Ok(serde_json::to_value(org)?)
}

/// Handle `cursus learner`.
pub async fn handle_learner(
    action: &LearnerCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    match action {
        LearnerCommands::Register { email, name } => Ok(serde_json::to_value(
            ctx.service
                .register_learner(org, email, name.as_deref())
                .await?,
        )?),
        LearnerCommands::List => Ok(serde_json::to_value(
            ctx.service.list_learners(org).await?,
        )?),
    }
}
