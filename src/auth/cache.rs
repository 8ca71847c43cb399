//! Token cache - persists OAuth token records across restarts.
//!
//! The cache file is plain JSON carrying an absolute `expires_at` epoch
//! timestamp, never a relative TTL, so reads stay correct no matter when the
//! process is restarted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Provider access tokens are long-lived. Used when a payload carries no
/// `expires_in` (pre-issued bearer tokens have no expiry metadata at all).
pub(crate) const DEFAULT_EXPIRES_IN_SECS: i64 = 180 * 24 * 3600;

/// Errors parsing an injected or cached token payload. Callers treat these
/// as token absence and fall back to the re-auth path.
#[derive(Debug, Error)]
pub enum TokenParseError {
    #[error("invalid token JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("token payload is missing access_token")]
    MissingAccessToken,
}

/// A cached OAuth token with absolute expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Absolute expiry, epoch seconds
    pub expires_at: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Wire shape of a token payload as the provider (or an operator injecting
/// `TICKTICK_OAUTH_TOKEN`) supplies it, with relative `expires_in` seconds.
#[derive(Debug, Deserialize)]
struct RawTokenPayload {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    refresh_token: Option<String>,
}

impl TokenRecord {
    /// Build a record from payload fields, converting relative `expires_in`
    /// to an absolute timestamp at `now`.
    pub fn from_expires_in(
        access_token: String,
        token_type: Option<String>,
        expires_in: Option<i64>,
        scope: Option<String>,
        refresh_token: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            access_token,
            token_type: token_type.unwrap_or_else(default_token_type),
            expires_at: now + expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            scope: scope.unwrap_or_default(),
            refresh_token,
        }
    }

    /// Record for a pre-issued bearer token with no expiry metadata.
    pub fn long_lived(access_token: String, now: i64) -> Self {
        Self::from_expires_in(access_token, None, None, None, None, now)
    }

    /// Parse an externally supplied JSON payload (`TICKTICK_OAUTH_TOKEN`).
    ///
    /// Expiry is recomputed at parse time from `expires_in`; a stale absolute
    /// value in the source is never trusted.
    pub fn from_injected_json(json: &str) -> Result<Self, TokenParseError> {
        let raw: RawTokenPayload = serde_json::from_str(json)?;
        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenParseError::MissingAccessToken)?;
        Ok(Self::from_expires_in(
            access_token,
            raw.token_type,
            raw.expires_in,
            raw.scope,
            raw.refresh_token,
            Utc::now().timestamp(),
        ))
    }
}

/// Read a token record, returning `None` when the file is absent or
/// malformed. Malformed content is logged, never fatal.
pub fn read(path: &Path) -> Option<TokenRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to read token cache {}: {}", path.display(), e);
            }
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("ignoring malformed token cache {}: {}", path.display(), e);
            None
        }
    }
}

/// Write a token record atomically: serialize to a sibling temp file, flush,
/// then rename over the target. An interrupted process never leaves a
/// half-written cache behind.
pub fn write(path: &Path, record: &TokenRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Parse an injected JSON payload and persist it to the cache file.
///
/// A cache write failure is logged but not fatal: the parsed record is still
/// valid in memory, only restarts lose it.
pub fn write_from_injected_json(json: &str, path: &Path) -> Result<TokenRecord, TokenParseError> {
    let record = TokenRecord::from_injected_json(json)?;
    if let Err(e) = write(path, &record) {
        tracing::warn!("failed to persist token cache {}: {}", path.display(), e);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> TokenRecord {
        TokenRecord {
            access_token: "tok1".to_string(),
            token_type: "bearer".to_string(),
            expires_at: 1_900_000_000,
            scope: "tasks:read tasks:write".to_string(),
            refresh_token: None,
        }
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".token-cache.json");

        let record = sample_record();
        write(&path, &record).unwrap();

        assert_eq!(read(&path), Some(record));
        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_read_absent_file_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(read(&dir.path().join("missing.json")), None);
    }

    #[test]
    fn test_read_malformed_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".token-cache.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(read(&path), None);
    }

    #[test]
    fn test_injected_json_computes_absolute_expiry() {
        let now = Utc::now().timestamp();
        let record =
            TokenRecord::from_injected_json(r#"{"access_token":"tok1","expires_in":3600}"#)
                .unwrap();
        assert_eq!(record.access_token, "tok1");
        // Parsed at T, expires at T+3600 (allow a little clock slop)
        assert!((record.expires_at - (now + 3600)).abs() <= 1);
        assert_eq!(record.token_type, "bearer");
    }

    #[test]
    fn test_injected_json_without_expires_in_is_long_lived() {
        let now = Utc::now().timestamp();
        let record = TokenRecord::from_injected_json(r#"{"access_token":"tok1"}"#).unwrap();
        assert!(record.expires_at >= now + DEFAULT_EXPIRES_IN_SECS - 1);
    }

    #[test]
    fn test_injected_json_missing_access_token_fails() {
        let err = TokenRecord::from_injected_json(r#"{"expires_in":3600}"#).unwrap_err();
        assert!(matches!(err, TokenParseError::MissingAccessToken));

        let err = TokenRecord::from_injected_json("not json at all").unwrap_err();
        assert!(matches!(err, TokenParseError::InvalidJson(_)));
    }

    #[test]
    fn test_write_from_injected_json_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".token-cache.json");

        let record = write_from_injected_json(
            r#"{"access_token":"tok1","expires_in":3600,"scope":"tasks:read"}"#,
            &path,
        )
        .unwrap();

        assert_eq!(read(&path), Some(record));
    }
}
