use anyhow::Context;
use cursus_config::CursusConfig;
use cursus_db::service::CursusService;

use crate::cli::GlobalFlags;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub service: CursusService,
}

/// Load layered configuration and apply command-line overrides.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<CursusConfig> {
    let mut config = CursusConfig::load_with_dotenv().context("failed to load configuration")?;
    if let Some(path) = &flags.db {
        config.database.path.clone_from(path);
        config.validate()?;
    }
    Ok(config)
}

impl AppContext {
    pub async fn init(config: &CursusConfig) -> anyhow::Result<Self> {
        let service = CursusService::from_config(config)
            .await
            .with_context(|| format!("failed to open database at {}", config.database.path))?;
        tracing::debug!(path = %config.database.path, "database opened");
        Ok(Self { service })
    }
}
