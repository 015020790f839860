use crate::config::Config;
use crate::error::Result;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum ShowResource {
    /// Show configuration, client secret and token paths
    Paths,
}

impl ShowResource {
    pub async fn execute(&self) -> Result<()> {
        match self {
            ShowResource::Paths => show_paths(),
        }
    }
}

fn show_paths() -> Result<()> {
    let config_path = Config::config_file()?;
    let config = Config::load_from(&config_path)?;

    info!(path = ?config_path, "Config path");
    info!(path = ?config.google.credentials_file()?, "Client secret path");
    info!(path = ?config.google.tokens_dir()?, "Token directory");
    info!(path = ?config.download.output_dir, "Download directory");

    Ok(())
}
