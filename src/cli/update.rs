use crate::config::Config;
use crate::error::Result;
use crate::service::WorkbookService;

pub async fn execute() -> Result<()> {
    let config = Config::load()?;
    let service = WorkbookService::from_config(&config)?;

    service.update_file()
}
