mod auth;
mod create;
mod details;
mod download;
mod show;
mod update;

use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "gsheet")]
#[command(about = "Create, inspect and download Google Sheets workbooks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Auth { reset } => auth::execute(*reset).await,
            Commands::Create { title } => create::execute(title).await,
            Commands::Details { id } => details::execute(id).await,
            Commands::Download { id, output_dir } => {
                download::execute(id, output_dir.as_deref()).await
            }
            Commands::Update => update::execute().await,
            Commands::Show { resource } => resource.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize access to Google Sheets
    Auth {
        /// Forget stored credentials first
        #[arg(long)]
        reset: bool,
    },
    /// Create a new workbook and print its id
    Create { title: String },
    /// Show title, size and last modification of a workbook
    Details { id: String },
    /// Download a workbook as .xlsx
    Download {
        id: String,
        /// Directory to write into (defaults to the configured output_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Push local changes to a workbook (not supported yet)
    Update,
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::parse_from(["gsheet", "download", "1AbC", "--output-dir", "/tmp/out"]);

        match cli.command {
            Commands::Download { id, output_dir } => {
                assert_eq!(id, "1AbC");
                assert_eq!(output_dir, Some(PathBuf::from("/tmp/out")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
