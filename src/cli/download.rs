use crate::config::Config;
use crate::error::Result;
use crate::models::WorkbookId;
use crate::service::WorkbookService;
use std::path::Path;
use tracing::info;

pub async fn execute(id: &str, output_dir: Option<&Path>) -> Result<()> {
    let id = WorkbookId::new(id)?;
    let mut config = Config::load()?;
    if let Some(dir) = output_dir {
        config.download.output_dir = dir.to_path_buf();
    }

    let service = WorkbookService::from_config(&config)?;
    let filename = service.get_latest_workbook(&id).await?;

    info!(path = ?filename.path(), "Workbook saved");
    println!("{}", filename);

    Ok(())
}
