//! ID prefix constants.
//!
//! Every entity ID is `{prefix}-{8 hex chars}`, generated in SQL by
//! `cursus_db::generate_id`.

pub const PREFIX_ORGANIZATION: &str = "org";
pub const PREFIX_LEARNER: &str = "lrn";
pub const PREFIX_COURSE: &str = "crs";
pub const PREFIX_MODULE: &str = "mod";
pub const PREFIX_GROUP: &str = "grp";
pub const PREFIX_ENROLLMENT: &str = "enr";
pub const PREFIX_PROGRESS: &str = "mpr";
pub const PREFIX_AUDIT: &str = "aud";

/// All prefixes, in dependency order.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_ORGANIZATION,
    PREFIX_LEARNER,
    PREFIX_COURSE,
    PREFIX_MODULE,
    PREFIX_GROUP,
    PREFIX_ENROLLMENT,
    PREFIX_PROGRESS,
    PREFIX_AUDIT,
];

/// Check that `id` carries the given prefix followed by a dash.
#[must_use]
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('-') && rest.len() > 1)
}
