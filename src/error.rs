use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Not authenticated: call authenticate before {0}")]
    NotAuthenticated(&'static str),

    #[error("Google API error: {0}")]
    Remote(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
