mod client;
mod connect;
mod drive;
mod errors;

pub use client::SheetsClient;
pub use connect::GoogleClientFactory;
pub use drive::DriveClient;

use crate::auth::Credential;
use crate::error::Result;
use crate::models::WorkbookId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;

/// The subset of Drive file metadata this tool reads
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
}

#[async_trait]
pub trait SpreadsheetOperations {
    async fn create_spreadsheet(&self, title: &str) -> Result<WorkbookId>;
}

#[async_trait]
pub trait FileOperations {
    async fn get_metadata(&self, file_id: &WorkbookId) -> Result<FileMetadata>;

    /// Stream an export of `file_id` into `sink`, returning the number of bytes written
    async fn export(
        &self,
        file_id: &WorkbookId,
        mime_type: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64>;
}

/// Builds authenticated remote clients from a credential
pub trait ClientFactory {
    type Spreadsheets: SpreadsheetOperations + Send + Sync;
    type Files: FileOperations + Send + Sync;

    fn spreadsheets(&self, credential: &Credential) -> Result<Self::Spreadsheets>;

    fn files(&self, credential: &Credential) -> Result<Self::Files>;
}
