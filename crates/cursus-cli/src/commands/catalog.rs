use cursus_core::enums::{CourseStatus, ModuleType};
use cursus_db::repos::course::{CourseFilter, NewCourse};
use cursus_db::repos::group::{GroupFilter, NewGroup};
use cursus_db::repos::module::NewModule;
use serde_json::{Value, json};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ReorderArgs;
use crate::cli::subcommands::{CourseCommands, GroupCommands, ModuleCommands};
use crate::commands::shared::parse::parse_optional_enum;
use crate::context::AppContext;

/// Handle `cursus course`.
pub async fn handle_course(
    action: &CourseCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let svc = &ctx.service;
    let course = match action {
        CourseCommands::Create {
            title,
            slug,
            description,
        } => {
            let input = NewCourse {
                title: title.clone(),
                slug: slug.clone(),
                description: description.clone(),
            };
            svc.create_course(org, &input).await?
        }
        CourseCommands::List { status } => {
            let filter = CourseFilter {
                status: parse_optional_enum::<CourseStatus>(status.as_deref(), "status")?,
            };
            return Ok(serde_json::to_value(svc.list_courses(org, &filter).await?)?);
        }
        CourseCommands::Get { id } => svc.get_course(org, id).await?,
        CourseCommands::Publish { id } => svc.publish_course(org, id).await?,
        CourseCommands::Unpublish { id } => svc.unpublish_course(org, id).await?,
        CourseCommands::Archive { id } => svc.archive_course(org, id).await?,
        CourseCommands::Delete { id } => {
            let detail = svc.delete_course(org, id).await?;
            return Ok(json!({ "deleted": id, "removed": detail }));
        }
    };
    Ok(serde_json::to_value(course)?)
}

/// Handle `cursus module`.
pub async fn handle_module(
    action: &ModuleCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    match action {
        ModuleCommands::Add {
            course,
            title,
            module_type,
            duration,
        } => {
            let input = NewModule {
                title: title.clone(),
                module_type: module_type.parse::<ModuleType>()?,
                duration_seconds: *duration,
            };
            Ok(serde_json::to_value(
                ctx.service.add_module(org, course, &input).await?,
            )?)
        }
        ModuleCommands::List { course } => Ok(serde_json::to_value(
            ctx.service.list_modules(org, course).await?,
        )?),
        ModuleCommands::Remove { id } => {
            ctx.service.remove_module(org, id).await?;
            Ok(json!({ "removed": id }))
        }
    }
}

/// Handle `cursus reorder`.
pub async fn handle_reorder(
    args: &ReorderArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let modules = ctx
        .service
        .reorder_modules(org, &args.course, &args.modules)
        .await?;
    Ok(serde_json::to_value(modules)?)
}

/// Handle `cursus group`.
pub async fn handle_group(
    action: &GroupCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    match action {
        GroupCommands::Create {
            name,
            capacity,
            course,
            description,
        } => {
            let input = NewGroup {
                name: name.clone(),
                description: description.clone(),
                capacity: *capacity,
                course_id: course.clone(),
            };
            Ok(serde_json::to_value(
                ctx.service.create_group(org, &input).await?,
            )?)
        }
        GroupCommands::List { course } => {
            let filter = GroupFilter {
                course_id: course.clone(),
            };
            Ok(serde_json::to_value(
                ctx.service.list_groups(org, &filter).await?,
            )?)
        }
        GroupCommands::Delete { id } => {
            ctx.service.delete_group(org, id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}

/// Handle `cursus occupancy`.
pub async fn handle_occupancy(
    group: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Value> {
    let org = flags.require_org()?;
    let occupancy = ctx.service.group_occupancy(org, group).await?;
    Ok(json!({
        "occupancy": occupancy,
        "free_seats": occupancy.free_seats(),
    }))
}
