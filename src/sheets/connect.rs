use super::{ClientFactory, DriveClient, SheetsClient};
use crate::auth::Credential;
use crate::error::{AppError, Result};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;

pub(super) fn https_connector() -> Result<HttpsConnector<HttpConnector>> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| AppError::Remote(format!("Failed to load native TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(connector)
}

pub(super) fn user_agent(application_name: &str) -> String {
    format!("{}/{}", application_name, env!("CARGO_PKG_VERSION"))
}

/// Builds Sheets and Drive clients that identify as `application_name`
pub struct GoogleClientFactory {
    application_name: String,
}

impl GoogleClientFactory {
    pub fn new(application_name: &str) -> Self {
        Self {
            application_name: application_name.to_string(),
        }
    }
}

impl ClientFactory for GoogleClientFactory {
    type Spreadsheets = SheetsClient;
    type Files = DriveClient;

    fn spreadsheets(&self, credential: &Credential) -> Result<SheetsClient> {
        SheetsClient::new(credential, &self.application_name)
    }

    fn files(&self, credential: &Credential) -> Result<DriveClient> {
        DriveClient::new(credential, &self.application_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_includes_version() {
        assert_eq!(
            user_agent("gsheet"),
            format!("gsheet/{}", env!("CARGO_PKG_VERSION"))
        );
    }
}
