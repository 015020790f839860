use crate::config::Config;
use crate::error::Result;
use crate::models::WorkbookId;
use crate::service::WorkbookService;
use tracing::info;

pub async fn execute(id: &str) -> Result<()> {
    let id = WorkbookId::new(id)?;
    let config = Config::load()?;
    let service = WorkbookService::from_config(&config)?;

    let workbook = service.get_spreadsheet_details(&id).await?;
    let updated = workbook
        .updated_at_utc()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    info!(
        title = workbook.title(),
        size = workbook.file_size(),
        updated = updated,
        updated_at_ms = workbook.updated_at(),
        "Workbook details"
    );

    Ok(())
}
