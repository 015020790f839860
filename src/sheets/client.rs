use super::SpreadsheetOperations;
use super::connect::{https_connector, user_agent};
use super::errors::{RemoteCall, from_sheets_error};
use crate::auth::Credential;
use crate::error::{AppError, Result};
use crate::models::WorkbookId;
use async_trait::async_trait;
use google_sheets4::api::{Scope, Sheets, Spreadsheet, SpreadsheetProperties};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::instrument;

// Access to spreadsheets created by or shared with the user
const AUTH_SCOPE: Scope = Scope::Spreadsheet;

pub struct SheetsClient {
    hub: Sheets<HttpsConnector<HttpConnector>>,
}

impl SheetsClient {
    /// Create a SheetsClient that sends `credential` as its bearer token
    pub fn new(credential: &Credential, application_name: &str) -> Result<Self> {
        let client =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(https_connector()?);

        let mut hub = Sheets::new(client, credential.access_token().to_string());
        hub.user_agent(user_agent(application_name));

        Ok(Self { hub })
    }
}

#[async_trait]
impl SpreadsheetOperations for SheetsClient {
    #[instrument(name = "Creating spreadsheet", skip(self))]
    async fn create_spreadsheet(&self, title: &str) -> Result<WorkbookId> {
        let spreadsheet = Spreadsheet {
            properties: Some(SpreadsheetProperties {
                title: Some(title.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (_, result) = self
            .hub
            .spreadsheets()
            .create(spreadsheet)
            .param("fields", "spreadsheetId")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| from_sheets_error(RemoteCall::Create, e))?;

        let spreadsheet_id = result
            .spreadsheet_id
            .ok_or_else(|| AppError::Remote("Created spreadsheet has empty ID".to_string()))?;

        WorkbookId::new(spreadsheet_id)
    }
}
