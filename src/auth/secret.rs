use crate::error::{AppError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use yup_oauth2::ApplicationSecret;

/// Load the client secret descriptor downloaded from the Google Cloud console.
///
/// Accepts both the `installed` and `web` layouts. Any failure here is a
/// configuration problem rather than an authorization one.
pub(super) fn load_client_secret(path: &Path) -> Result<ApplicationSecret> {
    let contents = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::Config(format!(
            "Client secret not found at {:?}. Download it from the Google Cloud console.",
            path
        )),
        _ => AppError::Config(format!("Failed to read client secret {:?}: {}", path, e)),
    })?;

    let secret = yup_oauth2::parse_application_secret(&contents)
        .map_err(|e| AppError::Config(format!("Invalid client secret {:?}: {}", path, e)))?;

    if secret.client_id.is_empty() {
        return Err(AppError::Config(format!(
            "Client secret {:?} has an empty client_id",
            path
        )));
    }

    Ok(secret)
}
