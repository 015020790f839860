use super::callback::{CallbackListener, redirect_url};
use super::secret::load_client_secret;
use super::{AuthorizationFlow, Credential, ScopeSet};
use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use oauth2::{
    AuthUrl, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, StandardRevocableToken, TokenResponse,
    TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

// Google omits expires_in only in unusual cases; assume the usual hour
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Installed-app authorization code flow with PKCE and a loopback redirect
pub struct LoopbackFlow {
    credentials_file: PathBuf,
    callback_port: u16,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl LoopbackFlow {
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            credentials_file: config.credentials_file()?,
            callback_port: config.callback_port,
            timeout: config.auth_timeout(),
            http_client,
        })
    }

    /// The client secret is only read once a token request is actually needed
    fn oauth_client(&self) -> Result<ConfiguredClient> {
        let secret = load_client_secret(&self.credentials_file)?;

        let auth_url = AuthUrl::new(secret.auth_uri)
            .map_err(|e| AppError::Config(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(secret.token_uri)
            .map_err(|e| AppError::Config(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(redirect_url(self.callback_port))
            .map_err(|e| AppError::Config(format!("Invalid redirect URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(secret.client_id))
            .set_client_secret(ClientSecret::new(secret.client_secret))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        Ok(client)
    }
}

#[async_trait]
impl AuthorizationFlow for LoopbackFlow {
    #[instrument(name = "Authorizing with Google", skip_all, fields(scopes = %scopes))]
    async fn authorize(&self, user: &str, scopes: &ScopeSet) -> Result<Credential> {
        let client = self.oauth_client()?;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(pkce_challenge)
            // Ask for a refresh token so later runs can skip the browser
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        // Bind before handing out the URL so the redirect cannot race the listener
        let listener = CallbackListener::bind(self.callback_port)?;

        println!("Open this URL in your browser:\n{}", auth_url);
        println!();
        println!("Waiting for authorization...");

        let callback = listener.wait(self.timeout).await?;
        let code = callback.into_code(csrf_token.secret())?;

        let token_result = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

        info!("Authorization granted");

        Ok(credential_from_response(user, scopes, &token_result, None))
    }

    #[instrument(name = "Refreshing Google credential", skip_all)]
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token()
            .ok_or_else(|| AppError::Auth("No refresh token stored".to_string()))?;

        let client = self.oauth_client()?;
        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        Ok(credential_from_response(
            credential.user(),
            &credential.scopes(),
            &token_result,
            Some(refresh_token),
        ))
    }
}

/// Build a credential from a token response.
///
/// Refresh responses usually omit the refresh token, so the previous one is
/// carried over via `fallback_refresh_token`.
fn credential_from_response(
    user: &str,
    scopes: &ScopeSet,
    token_result: &BasicTokenResponse,
    fallback_refresh_token: Option<&str>,
) -> Credential {
    let refresh_token = token_result
        .refresh_token()
        .map(|token| token.secret().clone())
        .or_else(|| fallback_refresh_token.map(str::to_string));

    let expires_in = token_result
        .expires_in()
        .map(|d| d.as_secs() as i64)
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expires_at = chrono::Utc::now().timestamp() + expires_in;

    Credential::new(
        user,
        scopes,
        token_result.access_token().secret().clone(),
        refresh_token,
        expires_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::secret::test_helpers::INSTALLED_SECRET;

    fn token_response(json: &str) -> BasicTokenResponse {
        serde_json::from_str(json).unwrap()
    }

    fn flow_with_secret(dir: &std::path::Path) -> LoopbackFlow {
        let path = dir.join("credentials.json");
        std::fs::write(&path, INSTALLED_SECRET).unwrap();
        let config = GoogleConfig {
            credentials_file: Some(path),
            tokens_dir: Some(dir.join("tokens")),
            ..Default::default()
        };
        LoopbackFlow::new(&config).unwrap()
    }

    #[test]
    fn test_credential_from_code_exchange() {
        let response = token_response(
            r#"{"access_token":"ya29.a","token_type":"Bearer","expires_in":3599,"refresh_token":"1//r","scope":"s"}"#,
        );
        let scopes = ScopeSet::spreadsheets();

        let credential = credential_from_response("user", &scopes, &response, None);

        assert_eq!(credential.access_token(), "ya29.a");
        assert_eq!(credential.refresh_token(), Some("1//r"));
        assert_eq!(credential.scopes(), scopes);
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let response =
            token_response(r#"{"access_token":"ya29.b","token_type":"Bearer","expires_in":3599}"#);

        let credential = credential_from_response(
            "user",
            &ScopeSet::drive_readonly(),
            &response,
            Some("1//old"),
        );

        assert_eq!(credential.access_token(), "ya29.b");
        assert_eq!(credential.refresh_token(), Some("1//old"));
    }

    #[test]
    fn test_oauth_client_uses_loopback_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let flow = flow_with_secret(dir.path());

        let client = flow.oauth_client().unwrap();
        let (url, _) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("s".to_string()))
            .url();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://127.0.0.1:8888/".to_string()
        )));
        assert!(pairs.contains(&(
            "client_id".to_string(),
            "123.apps.googleusercontent.com".to_string()
        )));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_before_listening() {
        let dir = tempfile::tempdir().unwrap();
        let config = GoogleConfig {
            credentials_file: Some(dir.path().join("absent.json")),
            ..Default::default()
        };
        let flow = LoopbackFlow::new(&config).unwrap();

        let err = flow
            .authorize("user", &ScopeSet::spreadsheets())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Config(_)));
    }
}
