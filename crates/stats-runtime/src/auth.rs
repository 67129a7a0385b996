//! Google OAuth2 credentials for read-only Cloud Storage access.
//!
//! A [`TokenSource`] either wraps a caller-supplied access token or holds a
//! service-account key. Service-account tokens are obtained with the JWT
//! bearer grant: an RS256-signed assertion is posted to the key's token
//! endpoint. Tokens are cached and reused until shortly before they expire.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use stats_core::error::{Result, StatsError, StorageError};
use tokio::sync::Mutex;
use tracing::debug;

/// OAuth2 scope granting read-only access to Cloud Storage.
pub const READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for each assertion (the maximum Google accepts).
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ── ServiceAccountKey ─────────────────────────────────────────────────────────

/// The fields of a service-account JSON key file that token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Authentication`] when the file is missing,
    /// unreadable, or not a service-account key.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StatsError::Authentication(format!("cannot read key file {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse key file contents.
    pub fn from_json(raw: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(raw)
            .map_err(|e| StatsError::Authentication(format!("invalid service account key: {e}")))?;
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(StatsError::Authentication(
                "service account key lacks client_email or private_key".to_string(),
            ));
        }
        Ok(key)
    }
}

// ── AccessToken ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// `true` while the token is comfortably before its expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

// ── TokenSource ───────────────────────────────────────────────────────────────

/// Supplies bearer tokens for storage requests.
pub enum TokenSource {
    /// A token obtained elsewhere (e.g. `gcloud auth print-access-token`).
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        http: reqwest::Client,
        cached: Mutex<Option<AccessToken>>,
    },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("TokenSource::Static(..)"),
            Self::ServiceAccount { key, .. } => f
                .debug_struct("TokenSource::ServiceAccount")
                .field("client_email", &key.client_email)
                .finish_non_exhaustive(),
        }
    }
}

impl TokenSource {
    pub fn from_static(token: impl Into<String>) -> Self {
        Self::Static(token.into())
    }

    pub fn service_account(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self::ServiceAccount {
            key,
            http,
            cached: Mutex::new(None),
        }
    }

    /// A bearer token valid for at least the expiry margin.
    ///
    /// Concurrent callers share one exchange; the lock is held across it.
    pub async fn token(&self) -> std::result::Result<String, StorageError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount { key, http, cached } => {
                let mut guard = cached.lock().await;
                if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                    return Ok(token.value.clone());
                }

                let token = exchange(http, key, Utc::now()).await?;
                debug!(
                    client_email = %key.client_email,
                    expires_at = %token.expires_at,
                    "obtained access token"
                );
                let value = token.value.clone();
                *guard = Some(token);
                Ok(value)
            }
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Sign the JWT bearer assertion for `key`.
pub(crate) fn build_assertion(
    key: &ServiceAccountKey,
    now: DateTime<Utc>,
) -> std::result::Result<String, StorageError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: READ_ONLY_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| StorageError::Unauthorized(format!("invalid private key: {e}")))?;

    encode(&header, &claims, &signing_key)
        .map_err(|e| StorageError::Unauthorized(format!("could not sign assertion: {e}")))
}

async fn exchange(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    now: DateTime<Utc>,
) -> std::result::Result<AccessToken, StorageError> {
    let assertion = build_assertion(key, now)?;

    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| StorageError::Transport(Box::new(e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StorageError::Unauthorized(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| StorageError::Transport(Box::new(e)))?;

    Ok(AccessToken {
        value: parsed.access_token,
        expires_at: now + Duration::seconds(parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
