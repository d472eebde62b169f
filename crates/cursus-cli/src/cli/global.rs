use clap::ValueEnum;

/// Shared output mode across all commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Single-line JSON.
    Raw,
}

/// Global flags available before or after subcommands.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub limit: Option<u32>,
    pub quiet: bool,
    pub verbose: bool,
    pub db: Option<String>,
    pub org: Option<String>,
}

impl GlobalFlags {
    /// The organization every tenant-scoped command runs in.
    pub fn require_org(&self) -> anyhow::Result<&str> {
        self.org
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("this command needs --org <organization id>"))
    }
}
