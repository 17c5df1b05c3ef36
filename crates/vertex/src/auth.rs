//! OAuth refresh-token credential source for Google APIs.
//!
//! Exchanges a long-lived refresh token for short-lived access tokens and
//! caches the current token until shortly before it expires.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;

use genrelay_core::provider::{CredentialError, TokenSource};
use genrelay_core::types::{BearerToken, Timestamp};

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default path of the JSON credentials file.
pub const DEFAULT_CREDENTIALS_FILE: &str = "cred.json";

/// Refresh this many seconds before the provider-declared expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Errors while loading OAuth client credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Missing OAuth credentials: set GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_REFRESH_TOKEN or provide {0}")]
    Missing(String),

    #[error("Failed to read credentials file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid credentials file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// OAuth client credentials plus a refresh token.
#[derive(Clone, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthCredentials {
    /// Read `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
    /// `GOOGLE_REFRESH_TOKEN`; if any is missing, fall back to the JSON file
    /// named by `GOOGLE_CREDENTIALS_FILE` (default `cred.json`).
    pub fn from_env() -> Result<Self, CredentialsError> {
        let vars = (
            std::env::var("GOOGLE_CLIENT_ID").ok(),
            std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            std::env::var("GOOGLE_REFRESH_TOKEN").ok(),
        );
        if let (Some(client_id), Some(client_secret), Some(refresh_token)) = vars {
            return Ok(Self {
                client_id,
                client_secret,
                refresh_token,
            });
        }

        let path = std::env::var("GOOGLE_CREDENTIALS_FILE")
            .unwrap_or_else(|_| DEFAULT_CREDENTIALS_FILE.to_string());
        if !std::path::Path::new(&path).exists() {
            return Err(CredentialsError::Missing(path));
        }
        Self::from_file(&path)
    }

    /// Load credentials from a JSON file with `client_id`, `client_secret`
    /// and `refresh_token` keys.
    pub fn from_file(path: &str) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| CredentialsError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

struct CachedToken {
    token: BearerToken,
    refresh_after: Timestamp,
}

/// [`TokenSource`] backed by the OAuth refresh-token grant.
pub struct OAuthTokenSource {
    client: reqwest::Client,
    credentials: OAuthCredentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenSource {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self::with_token_url(credentials, GOOGLE_TOKEN_URL.to_string())
    }

    pub fn with_token_url(credentials: OAuthCredentials, token_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            token_url,
            cached: Mutex::new(None),
        }
    }

    async fn refresh(&self) -> Result<TokenResponse, CredentialError> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CredentialError(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialError(format!("Undecodable token response: {e}")))
    }
}

#[async_trait]
impl TokenSource for OAuthTokenSource {
    async fn access_token(&self) -> Result<BearerToken, CredentialError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(entry) = cached.as_ref() {
            if now < entry.refresh_after {
                return Ok(entry.token.clone());
            }
        }

        let fresh = self.refresh().await.inspect_err(|e| {
            tracing::warn!(error = %e, "OAuth token refresh failed");
        })?;
        let lifetime = fresh.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let token = BearerToken::new(fresh.access_token);

        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_after: refresh_deadline(now, lifetime),
        });
        tracing::debug!(expires_in = lifetime, "OAuth access token refreshed");

        Ok(token)
    }
}

/// Instant after which a token issued at `issued` with `expires_in` seconds
/// of lifetime should be refreshed.
fn refresh_deadline(issued: Timestamp, expires_in: i64) -> Timestamp {
    let usable = (expires_in - EXPIRY_MARGIN_SECS).max(0);
    issued + chrono::Duration::seconds(usable)
}
