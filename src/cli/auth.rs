use crate::auth::CredentialStore;
use crate::config::Config;
use crate::error::Result;
use crate::service::WorkbookService;
use tracing::info;

pub async fn execute(reset: bool) -> Result<()> {
    let config = Config::load()?;

    if reset {
        let store = CredentialStore::new(config.google.tokens_dir()?, &config.google.user);
        let removed = store.clear()?;
        info!(removed, "Cleared stored credentials");
    }

    let mut service = WorkbookService::from_config(&config)?;
    service.authenticate().await?;

    info!("Google Sheets authentication verified");

    Ok(())
}
