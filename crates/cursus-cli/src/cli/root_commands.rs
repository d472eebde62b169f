use clap::{Args, Subcommand};

use crate::cli::subcommands::{
    CourseCommands, GroupCommands, LearnerCommands, ModuleCommands, OrgCommands,
};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Organizations.
    Org {
        #[command(subcommand)]
        action: OrgCommands,
    },
    /// Learners.
    Learner {
        #[command(subcommand)]
        action: LearnerCommands,
    },
    /// Courses.
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },
    /// Course modules.
    Module {
        #[command(subcommand)]
        action: ModuleCommands,
    },
    /// Cohort groups.
    Group {
        #[command(subcommand)]
        action: GroupCommands,
    },
    /// Enroll a learner in a course.
    Enroll(EnrollArgs),
    /// List enrollments.
    Enrollments(EnrollmentsArgs),
    /// Cancel an enrollment.
    Cancel { id: String },
    /// Admit a waitlisted enrollment if its group has a free seat.
    Promote { id: String },
    /// Start a module for an enrollment.
    Start(ModuleTargetArgs),
    /// Complete a module for an enrollment.
    Complete(CompleteArgs),
    /// Show per-module progress for an enrollment.
    Progress { enrollment: String },
    /// Recompute an enrollment's aggregate progress.
    Recompute { enrollment: String },
    /// Reorder a course's modules.
    Reorder(ReorderArgs),
    /// Show seat usage for a group.
    Occupancy { group: String },
    /// Query the audit trail.
    Audit(AuditArgs),
}

#[derive(Clone, Debug, Args)]
pub struct EnrollArgs {
    pub course: String,
    pub learner: String,
    #[arg(long)]
    pub group: Option<String>,
    /// Free-form JSON object stored with the enrollment.
    #[arg(long)]
    pub metadata: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct EnrollmentsArgs {
    #[arg(long)]
    pub course: Option<String>,
    #[arg(long)]
    pub learner: Option<String>,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ModuleTargetArgs {
    pub enrollment: String,
    pub module: String,
}

#[derive(Clone, Debug, Args)]
pub struct CompleteArgs {
    pub enrollment: String,
    pub module: String,
    #[arg(long)]
    pub score: Option<f64>,
}

#[derive(Clone, Debug, Args)]
pub struct ReorderArgs {
    pub course: String,
    /// Every module ID of the course, in the new order.
    #[arg(required = true, num_args = 1..)]
    pub modules: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct AuditArgs {
    #[arg(long)]
    pub entity_type: Option<String>,
    #[arg(long)]
    pub entity_id: Option<String>,
    #[arg(long)]
    pub action: Option<String>,
}
