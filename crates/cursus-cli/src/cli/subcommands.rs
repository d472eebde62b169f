use clap::Subcommand;

/// Organization commands.
#[derive(Clone, Debug, Subcommand)]
pub enum OrgCommands {
    /// Create an organization.
    Create {
        name: String,
        #[arg(long)]
        slug: Option<String>,
    },
    /// Get an organization by ID.
    Get { id: String },
}

/// Learner commands.
#[derive(Clone, Debug, Subcommand)]
pub enum LearnerCommands {
    /// Register a learner in the organization.
    Register {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// List learners.
    List,
}

/// Course catalog commands.
#[derive(Clone, Debug, Subcommand)]
pub enum CourseCommands {
    /// Create a draft course.
    Create {
        title: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List courses.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Get a course by ID.
    Get { id: String },
    /// Publish a course.
    Publish { id: String },
    /// Move a course back to draft.
    Unpublish { id: String },
    /// Archive a course.
    Archive { id: String },
    /// Delete a course with its modules, enrollments and progress.
    Delete { id: String },
}

/// Module commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ModuleCommands {
    /// Append a module to a course.
    Add {
        course: String,
        title: String,
        #[arg(long = "type", default_value = "article")]
        module_type: String,
        #[arg(long)]
        duration: Option<i64>,
    },
    /// List a course's modules in order.
    List { course: String },
    /// Remove a module and its progress records.
    Remove { id: String },
}

/// Cohort group commands.
#[derive(Clone, Debug, Subcommand)]
pub enum GroupCommands {
    /// Create a group.
    Create {
        name: String,
        #[arg(long)]
        capacity: Option<i64>,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List groups.
    List {
        #[arg(long)]
        course: Option<String>,
    },
    /// Delete a group, detaching its enrollments.
    Delete { id: String },
}
