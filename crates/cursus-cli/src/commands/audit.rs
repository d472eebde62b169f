use cursus_core::enums::{AuditAction, EntityType};
use cursus_db::repos::audit::AuditFilter;
use serde_json::Value;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::AuditArgs;
use crate::commands::shared::parse::parse_optional_enum;
use crate::context::AppContext;

/// Handle `cursus audit`.
pub async fn handle(
    args: &AuditArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let filter = AuditFilter {
        entity_type: parse_optional_enum::<EntityType>(args.entity_type.as_deref(), "entity type")?,
        entity_id: args.entity_id.clone(),
        action: parse_optional_enum::<AuditAction>(args.action.as_deref(), "action")?,
        limit: flags.limit,
    };
    Ok(serde_json::to_value(
        ctx.service.query_audit(org, &filter).await?,
    )?)
}
