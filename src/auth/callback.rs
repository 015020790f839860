use crate::error::{AppError, Result};
use oauth2::AuthorizationCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use tracing::debug;
use url::Url;

/// Longest single `recv_timeout`, bounding how late a cancellation is noticed
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the authorization server sent back to the loopback redirect
#[derive(Debug, PartialEq)]
pub(super) enum AuthorizationCallback {
    Code { code: String, state: Option<String> },
    Denied { error: String },
}

impl AuthorizationCallback {
    /// Parse a request target such as `/?code=...&state=...`; `None` for
    /// requests that are not an authorization response (e.g. favicon)
    pub(super) fn parse(target: &str) -> Option<Self> {
        let url = Url::parse("http://127.0.0.1")
            .and_then(|base| base.join(target))
            .ok()?;

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            return Some(AuthorizationCallback::Denied { error });
        }

        param("code").map(|code| AuthorizationCallback::Code {
            code,
            state: param("state"),
        })
    }

    pub(super) fn into_code(self, expected_state: &str) -> Result<AuthorizationCode> {
        match self {
            AuthorizationCallback::Denied { error } => Err(AppError::Auth(format!(
                "Authorization was not granted: {}",
                error
            ))),
            AuthorizationCallback::Code { code, state } => {
                if state.as_deref() != Some(expected_state) {
                    return Err(AppError::Auth("CSRF token mismatch".to_string()));
                }
                Ok(AuthorizationCode::new(code))
            }
        }
    }
}

/// Loopback HTTP listener receiving the authorization redirect.
///
/// The port is held from `bind` until `wait` returns or its future is dropped;
/// the server is dropped on every exit path.
pub(super) struct CallbackListener {
    server: Server,
}

/// Flags the blocking wait as abandoned when the awaiting future goes away
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CallbackListener {
    pub(super) fn bind(port: u16) -> Result<Self> {
        let bind_addr = format!("127.0.0.1:{}", port);
        let server = Server::http(&bind_addr)
            .map_err(|e| AppError::Auth(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        Ok(Self { server })
    }

    /// Block (off the async runtime) until a callback arrives or `timeout` elapses
    pub(super) async fn wait(self, timeout: Duration) -> Result<AuthorizationCallback> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        tokio::task::spawn_blocking(move || self.wait_blocking(timeout, &cancelled))
            .await
            .map_err(|e| AppError::Auth(format!("Callback listener failed: {}", e)))?
    }

    fn wait_blocking(
        self,
        timeout: Duration,
        cancelled: &AtomicBool,
    ) -> Result<AuthorizationCallback> {
        // Too far out to represent means no deadline at all
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if cancelled.load(Ordering::Relaxed) {
                debug!("Authorization wait cancelled");
                return Err(AppError::Auth("Authorization was cancelled".to_string()));
            }

            let remaining = deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(POLL_INTERVAL);
            if remaining.is_zero() {
                return Err(AppError::Auth(format!(
                    "Timed out after {}s waiting for authorization",
                    timeout.as_secs()
                )));
            }

            let request = self
                .server
                .recv_timeout(remaining.min(POLL_INTERVAL))
                .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;

            let Some(request) = request else {
                continue;
            };

            let Some(callback) = AuthorizationCallback::parse(request.url()) else {
                debug!(url = request.url(), "Ignoring unrelated request");
                let _ = request.respond(Response::from_string("Not found").with_status_code(404));
                continue;
            };

            let message = match &callback {
                AuthorizationCallback::Code { .. } => {
                    "Authentication successful! You can close this window."
                }
                AuthorizationCallback::Denied { .. } => {
                    "Authorization was not granted. You can close this window."
                }
            };
            request
                .respond(Response::from_string(message))
                .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))?;

            return Ok(callback);
        }
    }
}

pub(super) fn redirect_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/", port)
}
