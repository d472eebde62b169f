use serde_json::Value;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to its handler and return the response body.
pub async fn dispatch(
    command: &Commands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    match command {
        Commands::Org { action } => commands::tenant::handle_org(action, ctx).await,
        Commands::Learner { action } => commands::tenant::handle_learner(action, ctx, flags).await,
        Commands::Course { action } => commands::catalog::handle_course(action, ctx, flags).await,
        Commands::Module { action } => commands::catalog::handle_module(action, ctx, flags).await,
        Commands::Group { action } => commands::catalog::handle_group(action, ctx, flags).await,
        Commands::Reorder(args) => commands::catalog::handle_reorder(args, ctx, flags).await,
        Commands::Occupancy { group } => {
            commands::catalog::handle_occupancy(group, ctx, flags).await
        }
        Commands::Enroll(args) => commands::enrollment::handle_enroll(args, ctx, flags).await,
        Commands::Enrollments(args) => commands::enrollment::handle_list(args, ctx, flags).await,
        Commands::Cancel { id } => commands::enrollment::handle_cancel(id, ctx, flags).await,
        Commands::Promote { id } => commands::enrollment::handle_promote(id, ctx, flags).await,
        Commands::Start(args) => commands::progress::handle_start(args, ctx, flags).await,
        Commands::Complete(args) => commands::progress::handle_complete(args, ctx, flags).await,
        Commands::Progress { enrollment } => {
            commands::progress::handle_progress(enrollment, ctx, flags).await
        }
        Commands::Recompute { enrollment } => {
            commands::progress::handle_recompute(enrollment, ctx, flags).await
        }
        Commands::Audit(args) => commands::audit::handle(args, ctx, flags).await,
    }
}
