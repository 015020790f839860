mod callback;
mod flow;
mod secret;
mod store;

pub use flow::LoopbackFlow;
pub use store::CredentialStore;

use crate::config::GoogleConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, instrument, warn};

/// Refresh this many seconds before the access token actually expires
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Immutable set of OAuth scopes, ordered so equal sets compare and hash equally
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(scopes.into_iter().map(Into::into).collect())
    }

    /// Scopes needed to create spreadsheets
    pub fn spreadsheets() -> Self {
        Self::new([google_sheets4::api::Scope::Spreadsheet.as_ref()])
    }

    /// Scopes needed to read file metadata and export files
    pub fn drive_readonly() -> Self {
        Self::new([google_drive3::api::Scope::Readonly.as_ref()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.iter().collect::<Vec<_>>().join(" ");
        f.write_str(&joined)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    user: String,
    scopes: Vec<String>,
    access_token: String,
    refresh_token: Option<String>,
    /// Expiry time as seconds since Unix epoch
    expires_at: i64,
}

impl Credential {
    pub(crate) fn new(
        user: &str,
        scopes: &ScopeSet,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            user: user.to_string(),
            scopes: scopes.iter().map(str::to_string).collect(),
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn scopes(&self) -> ScopeSet {
        ScopeSet::new(self.scopes.iter().cloned())
    }

    /// Check if the access token is expired or about to expire (within 5 minutes)
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at < (now + EXPIRY_MARGIN_SECS)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("scopes", &self.scopes)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Anything that can hand out a usable credential for a scope set
#[async_trait]
pub trait CredentialProvider {
    async fn obtain_credential(&self, scopes: &ScopeSet) -> Result<Credential>;
}

/// Interactive consent and token refresh against the authorization server
#[async_trait]
pub trait AuthorizationFlow {
    async fn authorize(&self, user: &str, scopes: &ScopeSet) -> Result<Credential>;

    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

/// Reuses stored credentials and only falls back to the interactive flow when
/// nothing usable is cached.
pub struct Authorizer<F> {
    store: CredentialStore,
    flow: F,
}

impl Authorizer<LoopbackFlow> {
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let store = CredentialStore::new(config.tokens_dir()?, &config.user);
        let flow = LoopbackFlow::new(config)?;
        Ok(Self::new(store, flow))
    }
}

impl<F> Authorizer<F>
where
    F: AuthorizationFlow + Sync,
{
    pub fn new(store: CredentialStore, flow: F) -> Self {
        Self { store, flow }
    }

    async fn authorize_and_save(&self, scopes: &ScopeSet) -> Result<Credential> {
        let credential = self.flow.authorize(self.store.user(), scopes).await?;
        self.store.save(scopes, &credential)?;
        Ok(credential)
    }
}

#[async_trait]
impl<F> CredentialProvider for Authorizer<F>
where
    F: AuthorizationFlow + Send + Sync,
{
    #[instrument(name = "Obtaining credential", skip_all, fields(scopes = %scopes))]
    async fn obtain_credential(&self, scopes: &ScopeSet) -> Result<Credential> {
        if let Some(stored) = self.store.load(scopes)? {
            debug!("Using stored credential");
            return Ok(stored);
        }

        let expired = self
            .store
            .load_entry(scopes)?
            .filter(|c| c.refresh_token().is_some());

        if let Some(expired) = expired {
            debug!("Access token expired, refreshing...");
            match self.flow.refresh(&expired).await {
                Ok(refreshed) => {
                    self.store.save(scopes, &refreshed)?;
                    return Ok(refreshed);
                }
                Err(e) => warn!("Credential refresh failed ({}), re-authorizing...", e),
            }
        }

        debug!("No usable stored credential, starting authorization flow");
        self.authorize_and_save(scopes).await
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::{Arc, Mutex};

    pub(crate) fn valid_credential(user: &str, scopes: &ScopeSet, token: &str) -> Credential {
        let expires_at = chrono::Utc::now().timestamp() + 3600;
        Credential::new(
            user,
            scopes,
            token.to_string(),
            Some("refresh".to_string()),
            expires_at,
        )
    }

    pub(crate) fn expired_credential(user: &str, scopes: &ScopeSet, token: &str) -> Credential {
        let expires_at = chrono::Utc::now().timestamp() - 60;
        Credential::new(
            user,
            scopes,
            token.to_string(),
            Some("refresh".to_string()),
            expires_at,
        )
    }

    #[derive(Clone, Default)]
    pub(crate) struct MockFlow {
        pub authorize_calls: Arc<Mutex<Vec<ScopeSet>>>,
        pub refresh_calls: Arc<Mutex<u32>>,
        pub fail_refresh: bool,
    }

    #[async_trait]
    impl AuthorizationFlow for MockFlow {
        async fn authorize(&self, user: &str, scopes: &ScopeSet) -> Result<Credential> {
            self.authorize_calls.lock().unwrap().push(scopes.clone());
            Ok(valid_credential(user, scopes, "interactive"))
        }

        async fn refresh(&self, credential: &Credential) -> Result<Credential> {
            *self.refresh_calls.lock().unwrap() += 1;
            if self.fail_refresh {
                return Err(AppError::Auth("refresh rejected".to_string()));
            }
            Ok(valid_credential(
                credential.user(),
                &credential.scopes(),
                "refreshed",
            ))
        }
    }
}
