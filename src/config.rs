//! Credential and configuration loading.
//!
//! All configuration comes from environment variables, set by the hosting
//! platform or a launcher upstream of this process:
//!
//! Required:
//! - `TICKTICK_CLIENT_ID` / `TICKTICK_CLIENT_SECRET` / `TICKTICK_REDIRECT_URI`
//!
//! Optional:
//! - `TICKTICK_ACCESS_TOKEN`: pre-issued bearer token, skips the OAuth flow
//! - `TICKTICK_OAUTH_TOKEN`: full JSON token payload for headless injection
//! - `TICKTICK_USER_ID`: numeric user id, needed for Inbox access
//! - `TICKTICK_USERNAME` / `TICKTICK_PASSWORD`: unofficial API credentials
//!   (pins, repeatFrom, activity logs)
//! - `TICKTICK_CONFIG_DIR`: overrides the token cache directory

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading credentials at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}

/// OAuth and account credentials, loaded once at process start and immutable
/// for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Pre-issued bearer token; skips the OAuth flow entirely
    pub access_token: Option<String>,
    /// Full JSON token payload injected for headless deployments
    pub oauth_token_json: Option<String>,
    /// Numeric user id; Inbox lives at the `inbox{user_id}` project
    pub user_id: Option<String>,
    /// Unofficial API account credentials
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Load credentials from the environment, failing when any of the three
    /// required OAuth variables is absent or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = Self {
            client_id: require("TICKTICK_CLIENT_ID")?,
            client_secret: require("TICKTICK_CLIENT_SECRET")?,
            redirect_uri: require("TICKTICK_REDIRECT_URI")?,
            access_token: optional("TICKTICK_ACCESS_TOKEN"),
            oauth_token_json: optional("TICKTICK_OAUTH_TOKEN"),
            user_id: optional("TICKTICK_USER_ID"),
            username: optional("TICKTICK_USERNAME"),
            password: optional("TICKTICK_PASSWORD"),
        };

        if credentials.has_unofficial_credentials() {
            tracing::info!("unofficial API credentials found (pins, repeatFrom, activity logs enabled)");
        } else {
            tracing::info!("unofficial API credentials not set (pins, repeatFrom, activity logs disabled)");
        }

        Ok(credentials)
    }

    pub fn has_unofficial_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::MissingVar(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Directory holding the token cache file.
///
/// Headless deployments usually have no home directory or durable volume, so
/// the OS temp dir is the fallback.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = optional("TICKTICK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::config_dir() {
        Some(base) => base.join("ticktick-mcp"),
        None => std::env::temp_dir().join("ticktick-mcp"),
    }
}

pub fn token_cache_path() -> PathBuf {
    config_dir().join(".token-cache.json")
}
