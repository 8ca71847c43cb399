//! OAuth2 token lifecycle for the TickTick API.
//!
//! The [`AuthManager`] owns all token state and is threaded through the
//! components that need authentication; there is no global singleton. Three
//! paths lead to a valid bearer token: the interactive authorization-code
//! flow (local deployments), token injection via `TICKTICK_OAUTH_TOKEN`
//! (headless deployments), and refresh when the provider issued a refresh
//! token. Token mutation is serialized behind a single lock so two concurrent
//! refreshes cannot overwrite a newer token with a stale one.

pub mod cache;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::config::Credentials;
use cache::{TokenParseError, TokenRecord};

const AUTHORIZE_URL: &str = "https://ticktick.com/oauth/authorize";
const TOKEN_URL: &str = "https://ticktick.com/oauth/token";
const OAUTH_SCOPE: &str = "tasks:read tasks:write";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Treat tokens as expired slightly before their literal expiry so an
/// in-flight API call does not race the cutoff.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Remediation steps surfaced with every "no valid token" error.
const REAUTH_HINT: &str = "run `ticktick-mcp oauth-server` and open /oauth/start to authorize, \
     then set TICKTICK_OAUTH_TOKEN to the returned JSON payload \
     (or TICKTICK_ACCESS_TOKEN to a bare token)";

#[derive(Debug, Error)]
pub enum AuthError {
    /// No path to a valid token exists; the message carries remediation steps
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("authorization code exchange failed (status {status}): {body}")]
    Exchange { status: u16, body: String },
    #[error("no authorization code found in {0:?}")]
    InvalidRedirect(String),
    #[error("token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    TokenParse(#[from] TokenParseError),
}

/// Authentication lifecycle phase. `AuthFailed` is terminal until an
/// interactive completion or token injection resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    Authorizing,
    Authenticated,
    Expired,
    AuthFailed,
}

/// True iff `record` should be treated as expired at `now` (epoch seconds),
/// applying the safety margin.
pub fn is_expired(record: &TokenRecord, now: i64) -> bool {
    now >= record.expires_at - EXPIRY_MARGIN_SECS
}

/// Token response from the provider's token endpoint
#[derive(Debug, Deserialize)]
struct ProviderTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    refresh_token: Option<String>,
}

struct AuthState {
    token: Option<TokenRecord>,
    phase: AuthPhase,
    /// Remembered refresh failure; repeated calls must not hammer the
    /// provider with a known-bad grant (lockout risk)
    failure: Option<String>,
}

/// Orchestrates the OAuth2 flows and exposes a valid bearer token to callers.
pub struct AuthManager {
    credentials: Credentials,
    cache_path: PathBuf,
    http: Client,
    token_url: String,
    state: Mutex<AuthState>,
}

impl AuthManager {
    /// Build the manager and resolve the startup token: a pre-issued bearer
    /// wins, then an injected JSON payload, then the cache file. Injection is
    /// handled here so headless processes start already authenticated,
    /// before any API call is attempted.
    pub fn new(credentials: Credentials, cache_path: PathBuf) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");

        let token = Self::resolve_startup_token(&credentials, &cache_path);
        let phase = if token.is_some() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };

        Self {
            credentials,
            cache_path,
            http,
            token_url: TOKEN_URL.to_string(),
            state: Mutex::new(AuthState {
                token,
                phase,
                failure: None,
            }),
        }
    }

    #[cfg(test)]
    fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    fn resolve_startup_token(credentials: &Credentials, cache_path: &Path) -> Option<TokenRecord> {
        if let Some(token) = &credentials.access_token {
            tracing::info!("using pre-issued access token from TICKTICK_ACCESS_TOKEN");
            return Some(TokenRecord::long_lived(
                token.clone(),
                Utc::now().timestamp(),
            ));
        }
        if let Some(json) = &credentials.oauth_token_json {
            match cache::write_from_injected_json(json, cache_path) {
                Ok(record) => {
                    tracing::info!("loaded injected token from TICKTICK_OAUTH_TOKEN");
                    return Some(record);
                }
                // Malformed injection is token absence, not a fatal error
                Err(e) => tracing::warn!("ignoring invalid TICKTICK_OAUTH_TOKEN: {}", e),
            }
        }
        let record = cache::read(cache_path);
        if record.is_some() {
            tracing::info!("loaded token from cache: {}", cache_path.display());
        }
        record
    }

    /// The primary entry point for all API calls: returns a valid bearer
    /// token, refreshing an expired one when the provider issued a refresh
    /// token. Refresh support is capability-gated; without it an expired
    /// token falls back to the re-authorization paths.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;

        if let Some(reason) = &state.failure {
            return Err(AuthError::NotAuthenticated(reason.clone()));
        }

        let now = Utc::now().timestamp();
        let record = match &state.token {
            Some(record) if !is_expired(record, now) => return Ok(record.access_token.clone()),
            Some(record) => record.clone(),
            None => {
                return Err(AuthError::NotAuthenticated(format!(
                    "no access token available; {}",
                    REAUTH_HINT
                )))
            }
        };

        state.phase = AuthPhase::Expired;
        let Some(refresh_token) = record.refresh_token else {
            return Err(AuthError::NotAuthenticated(format!(
                "access token expired and the provider issued no refresh token; {}",
                REAUTH_HINT
            )));
        };

        // The lock is held across the refresh on purpose: a second caller
        // waits here instead of racing its own refresh.
        tracing::info!("access token expired, refreshing");
        match self.refresh(&refresh_token).await {
            Ok(refreshed) => {
                self.persist(&refreshed);
                let token = refreshed.access_token.clone();
                state.token = Some(refreshed);
                state.phase = AuthPhase::Authenticated;
                Ok(token)
            }
            Err(e) => {
                // No silent retry: a known-bad grant stays failed until the
                // operator re-authorizes.
                let reason = format!("token refresh failed ({}); {}", e, REAUTH_HINT);
                state.phase = AuthPhase::AuthFailed;
                state.failure = Some(reason.clone());
                Err(AuthError::RefreshFailed(reason))
            }
        }
    }

    /// Entry point for both the interactive and headless authorization
    /// flows: builds the provider's authorization URL. The user-interaction
    /// mechanism (browser, console paste, HTTP redirect) is the caller's.
    pub async fn start_authorization(&self) -> Url {
        let mut state = self.state.lock().await;
        state.phase = AuthPhase::Authorizing;
        drop(state);
        self.authorize_url()
    }

    fn authorize_url(&self) -> Url {
        let state_param = Uuid::new_v4().simple().to_string();
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", OAUTH_SCOPE),
                ("response_type", "code"),
                ("state", state_param.as_str()),
            ],
        )
        .expect("static authorize URL is valid")
    }

    /// Complete the interactive flow from whatever the user pasted back:
    /// either the full redirected URL or a bare authorization code.
    pub async fn complete_interactive_flow(&self, pasted: &str) -> Result<TokenRecord, AuthError> {
        let code = extract_code(pasted)
            .ok_or_else(|| AuthError::InvalidRedirect(pasted.to_string()))?;
        self.handle_callback(&code).await
    }

    /// Exchange an authorization code for a token, persist it, and mark the
    /// manager authenticated. Used by both the interactive flow and the
    /// headless HTTP callback.
    pub async fn handle_callback(&self, code: &str) -> Result<TokenRecord, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await?;

        let record = self.token_response(response).await?;

        // The state lock guards the cache file too: persisting outside it
        // would let two concurrent exchanges leave the file and memory
        // holding different tokens.
        let mut state = self.state.lock().await;
        self.persist(&record);
        state.token = Some(record.clone());
        state.phase = AuthPhase::Authenticated;
        state.failure = None;
        Ok(record)
    }

    /// Parse and cache an externally persisted token payload, replacing any
    /// current token. Expiry is recomputed from `expires_in` at parse time.
    pub async fn load_injected_token(&self, json: &str) -> Result<TokenRecord, AuthError> {
        let record = TokenRecord::from_injected_json(json)?;
        // Persist under the state lock, same as handle_callback
        let mut state = self.state.lock().await;
        self.persist(&record);
        state.token = Some(record.clone());
        state.phase = AuthPhase::Authenticated;
        state.failure = None;
        Ok(record)
    }

    pub async fn phase(&self) -> AuthPhase {
        self.state.lock().await.phase
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await?;
        self.token_response(response).await
    }

    async fn token_response(&self, response: reqwest::Response) -> Result<TokenRecord, AuthError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                body,
            });
        }
        let payload: ProviderTokenResponse = response.json().await?;
        Ok(TokenRecord::from_expires_in(
            payload.access_token,
            payload.token_type,
            payload.expires_in,
            payload.scope,
            payload.refresh_token,
            Utc::now().timestamp(),
        ))
    }

    fn persist(&self, record: &TokenRecord) {
        // The token still lives in memory on failure; only restarts lose it
        if let Err(e) = cache::write(&self.cache_path, record) {
            tracing::warn!(
                "failed to persist token cache {}: {}",
                self.cache_path.display(),
                e
            );
        }
    }
}

/// Pull the authorization code out of a pasted redirect URL, or accept a
/// bare code as-is.
fn extract_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if let Ok(url) = Url::parse(trimmed) {
        if let Some((_, code)) = url.query_pairs().find(|(key, _)| key == "code") {
            return Some(code.into_owned());
        }
    }
    (!trimmed.is_empty() && !trimmed.contains(['/', '?', '&', '='])).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Stub token endpoint answering every request with the given payload.
    async fn spawn_token_endpoint(body: serde_json::Value) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().fallback(move || {
            let body = body.clone();
            async move { axum::Json(body) }
        });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_credentials() -> Credentials {
        Credentials {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8000/callback".to_string(),
            access_token: None,
            oauth_token_json: None,
            user_id: None,
            username: None,
            password: None,
        }
    }

    #[test]
    fn test_is_expired_applies_safety_margin() {
        let record = TokenRecord {
            access_token: "tok".to_string(),
            token_type: "bearer".to_string(),
            expires_at: 1000,
            scope: String::new(),
            refresh_token: None,
        };
        // Margin is 60s: the cutoff is expires_at - 60
        assert!(!is_expired(&record, 939));
        assert!(is_expired(&record, 940));
        assert!(is_expired(&record, 1000));
        assert!(is_expired(&record, 1001));
    }

    #[test]
    fn test_authorize_url_carries_oauth_params() {
        let dir = tempdir().unwrap();
        let manager = AuthManager::new(test_credentials(), dir.path().join("token.json"));

        let url = manager.authorize_url();
        assert_eq!(url.host_str(), Some("ticktick.com"));
        assert_eq!(url.path(), "/oauth/authorize");

        let params: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params["client_id"], "cid");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], OAUTH_SCOPE);
        assert!(!params["state"].is_empty());
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(
            extract_code("http://localhost:8000/callback?code=abc123&state=xyz"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_code("  abc123  "), Some("abc123".to_string()));
        assert_eq!(extract_code("http://localhost:8000/callback?state=xyz"), None);
        assert_eq!(extract_code(""), None);
    }

    #[tokio::test]
    async fn test_startup_resolution_prefers_injected_token() {
        let dir = tempdir().unwrap();
        let mut credentials = test_credentials();
        credentials.oauth_token_json =
            Some(r#"{"access_token":"tok1","expires_in":3600}"#.to_string());

        let manager = AuthManager::new(credentials, dir.path().join("token.json"));
        assert_eq!(manager.phase().await, AuthPhase::Authenticated);
        assert_eq!(manager.get_valid_token().await.unwrap(), "tok1");
        // Injection also persisted the record for later restarts
        assert!(cache::read(&dir.path().join("token.json")).is_some());
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_capability_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        cache::write(
            &path,
            &TokenRecord {
                access_token: "stale".to_string(),
                token_type: "bearer".to_string(),
                expires_at: Utc::now().timestamp() - 10,
                scope: String::new(),
                refresh_token: None,
            },
        )
        .unwrap();

        let manager = AuthManager::new(test_credentials(), path);
        let err = manager.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated(_)));
        // The error tells the operator how to re-authorize
        assert!(err.to_string().contains("oauth-server"));
        assert_eq!(manager.phase().await, AuthPhase::Expired);
    }

    #[tokio::test]
    async fn test_no_token_at_all_errors_with_remediation() {
        let dir = tempdir().unwrap();
        let manager = AuthManager::new(test_credentials(), dir.path().join("token.json"));
        assert_eq!(manager.phase().await, AuthPhase::Unauthenticated);

        let err = manager.get_valid_token().await.unwrap_err();
        assert!(err.to_string().contains("TICKTICK_OAUTH_TOKEN"));
    }

    #[tokio::test]
    async fn test_interactive_flow_exchanges_pasted_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        let endpoint = spawn_token_endpoint(serde_json::json!({
            "access_token": "fresh",
            "token_type": "bearer",
            "expires_in": 3600,
        }))
        .await;

        let manager =
            AuthManager::new(test_credentials(), path.clone()).with_token_url(endpoint);
        let record = manager
            .complete_interactive_flow("http://localhost:8000/callback?code=abc123&state=xyz")
            .await
            .unwrap();

        assert_eq!(record.access_token, "fresh");
        assert_eq!(manager.phase().await, AuthPhase::Authenticated);
        assert_eq!(manager.get_valid_token().await.unwrap(), "fresh");
        // The exchanged token was persisted for later restarts
        assert_eq!(
            cache::read(&path).map(|r| r.access_token),
            Some("fresh".to_string())
        );
    }

    #[tokio::test]
    async fn test_interactive_flow_rejects_paste_without_code() {
        let dir = tempdir().unwrap();
        let manager = AuthManager::new(test_credentials(), dir.path().join("token.json"));

        let err = manager
            .complete_interactive_flow("http://localhost:8000/callback?state=xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRedirect(_)));
    }

    #[tokio::test]
    async fn test_concurrent_injection_keeps_cache_and_memory_consistent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        let manager = Arc::new(AuthManager::new(test_credentials(), path.clone()));

        // Two racing injections; whichever wins, the cache file and the
        // in-memory token must agree afterwards.
        let a = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .load_injected_token(r#"{"access_token":"tokA","expires_in":3600}"#)
                    .await
            })
        };
        let b = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .load_injected_token(r#"{"access_token":"tokB","expires_in":3600}"#)
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let in_memory = manager.get_valid_token().await.unwrap();
        let on_disk = cache::read(&path).unwrap().access_token;
        assert_eq!(in_memory, on_disk);
    }

    #[tokio::test]
    async fn test_injection_replaces_current_token() {
        let dir = tempdir().unwrap();
        let manager = AuthManager::new(test_credentials(), dir.path().join("token.json"));

        manager
            .load_injected_token(r#"{"access_token":"tok2","expires_in":3600}"#)
            .await
            .unwrap();
        assert_eq!(manager.get_valid_token().await.unwrap(), "tok2");
    }
}
