use crate::config::Config;
use crate::error::Result;
use crate::service::WorkbookService;
use tracing::info;

pub async fn execute(title: &str) -> Result<()> {
    let config = Config::load()?;
    let mut service = WorkbookService::from_config(&config)?;

    service.authenticate().await?;
    let id = service.create_workbook(title).await?;

    info!(url = format!("https://docs.google.com/spreadsheets/d/{}", id), "Workbook created");
    println!("{}", id);

    Ok(())
}
