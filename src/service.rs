use crate::auth::{Authorizer, CredentialProvider, LoopbackFlow, ScopeSet};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Filename, Workbook, WorkbookId, XLSX_MIME_TYPE};
use crate::sheets::{ClientFactory, FileOperations, GoogleClientFactory, SpreadsheetOperations};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

enum Session<S> {
    Unauthenticated,
    Authenticated(S),
}

/// Entry point for every workbook operation.
///
/// Creating a workbook needs a prior `authenticate`; metadata and downloads
/// authorize their own read-only Drive credential on each call.
pub struct WorkbookService<A, F: ClientFactory> {
    authorizer: A,
    factory: F,
    output_dir: PathBuf,
    session: Session<F::Spreadsheets>,
}

impl WorkbookService<Authorizer<LoopbackFlow>, GoogleClientFactory> {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Authorizer::from_config(&config.google)?,
            GoogleClientFactory::new(&config.google.application_name),
            config.download.output_dir.clone(),
        ))
    }
}

impl<A, F> WorkbookService<A, F>
where
    A: CredentialProvider + Sync,
    F: ClientFactory,
{
    pub fn new(authorizer: A, factory: F, output_dir: PathBuf) -> Self {
        Self {
            authorizer,
            factory,
            output_dir,
            session: Session::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.session, Session::Authenticated(_))
    }

    /// Authorize the spreadsheet scope and keep the client for later calls.
    /// A second call is a no-op.
    #[instrument(name = "Authenticating to Google Sheets", skip_all)]
    pub async fn authenticate(&mut self) -> Result<()> {
        if self.is_authenticated() {
            debug!("Already authenticated");
            return Ok(());
        }

        let credential = self
            .authorizer
            .obtain_credential(&ScopeSet::spreadsheets())
            .await?;
        let client = self.factory.spreadsheets(&credential)?;
        self.session = Session::Authenticated(client);

        Ok(())
    }

    pub async fn create_workbook(&self, title: &str) -> Result<WorkbookId> {
        let Session::Authenticated(sheets) = &self.session else {
            return Err(AppError::NotAuthenticated("create_workbook"));
        };

        let id = sheets.create_spreadsheet(title).await?;
        info!(id = %id, title, "Created workbook");

        Ok(id)
    }

    pub async fn get_spreadsheet_details(&self, id: &WorkbookId) -> Result<Workbook> {
        let files = self.file_client().await?;
        let metadata = files.get_metadata(id).await?;

        Ok(metadata.into())
    }

    /// Export `id` as xlsx into a freshly named file under the output directory.
    ///
    /// On failure a partial file may remain; removing it is up to the caller.
    #[instrument(name = "Downloading workbook", skip_all, fields(id = %id))]
    pub async fn get_latest_workbook(&self, id: &WorkbookId) -> Result<Filename> {
        let files = self.file_client().await?;

        let filename = Filename::generate_in(&self.output_dir);

        let bytes = {
            let mut writer = BufWriter::new(File::create_new(filename.path())?);
            files.export(id, XLSX_MIME_TYPE, &mut writer).await?
        };

        info!(path = ?filename.path(), bytes, "Downloaded workbook");
        Ok(filename)
    }

    /// Updating a remote workbook has no wire contract yet
    pub fn update_file(&self) -> Result<()> {
        Err(AppError::Unimplemented("update_file"))
    }

    async fn file_client(&self) -> Result<F::Files> {
        let credential = self
            .authorizer
            .obtain_credential(&ScopeSet::drive_readonly())
            .await?;
        self.factory.files(&credential)
    }
}
