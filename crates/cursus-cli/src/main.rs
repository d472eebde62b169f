use clap::Parser;
use cursus_core::errors::ErrorKind;
use cursus_db::error::DatabaseError;

mod cli;
mod commands;
mod context;
mod output;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("cursus error: {error:#}");
        std::process::exit(exit_code(error_kind(&error)));
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let flags = cli.global_flags();

    let config = context::load_config(&flags)?;
    init_tracing(flags.quiet, flags.verbose, &config.general.log_filter)?;

    let ctx = context::AppContext::init(&config).await?;
    let response = commands::dispatch::dispatch(&cli.command, &ctx, &flags).await?;
    output::output(&response, flags.format)
}

fn init_tracing(quiet: bool, verbose: bool, configured: &str) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        configured
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("CURSUS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Kind of the engine error somewhere in the chain, if any.
fn error_kind(error: &anyhow::Error) -> Option<ErrorKind> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<DatabaseError>())
        .map(DatabaseError::kind)
}

/// Process exit status for a failed command.
const fn exit_code(kind: Option<ErrorKind>) -> i32 {
    match kind {
        Some(ErrorKind::InvalidInput) => 3,
        Some(ErrorKind::NotFound) => 4,
        Some(ErrorKind::AlreadyEnrolled) => 5,
        Some(ErrorKind::Blocked) => 6,
        Some(ErrorKind::Conflict) => 7,
        Some(ErrorKind::Internal) | None => 1,
    }
}
