//! OAuth2 client-credentials exchange against the Marketo identity service
//!
//! One token is shared by every caller of a client. The cache lock is held
//! across the exchange, so callers racing on an empty or expired cache wait
//! for the single request in flight and reuse its token.

use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tfplug::Context;
use tokio::sync::Mutex;

use super::common::{parse_retry_after, ApiQueryParams};
use super::error::ApiError;

/// Refresh this long before the server-side expiry
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Longest lifetime taken from the identity service; Marketo issues one-hour
/// tokens
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// When the cache stops handing the token out
    pub refresh_at: Instant,
}

impl AccessToken {
    /// Token the server says is valid for `expires_in` seconds. A token
    /// with less than [`EXPIRY_SKEW`] left is still used for half of what
    /// remains.
    pub fn issued(value: String, expires_in: u64) -> Self {
        let lifetime = Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME);
        let usable = lifetime.saturating_sub(EXPIRY_SKEW).max(lifetime / 2);
        Self {
            value,
            refresh_at: Instant::now() + usable,
        }
    }

    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("refresh_at", &self.refresh_at)
            .finish()
    }
}

/// Response from GET /identity/oauth/token
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct Authenticator {
    identity_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<AccessToken>>,
    exchanges: AtomicUsize,
}

impl Authenticator {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            identity_url: format!("{}/identity/oauth/token", base_url),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            cached: Mutex::new(None),
            exchanges: AtomicUsize::new(0),
        }
    }

    /// Number of credential exchanges performed so far
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Return the cached token, exchanging credentials first when the cache
    /// is empty or about to expire
    pub async fn token(
        &self,
        ctx: &Context,
        http: &reqwest::Client,
    ) -> Result<AccessToken, ApiError> {
        let mut cached = tokio::select! {
            _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            guard = self.cached.lock() => guard,
        };

        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.clone());
            }
            tracing::debug!("Access token expired, refreshing");
        }

        let token = tokio::select! {
            _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            token = self.exchange(http) => token?,
        };
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token if it is the one the server rejected. A newer
    /// token fetched by a concurrent caller is left alone.
    pub async fn invalidate(&self, stale: &AccessToken) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref() == Some(stale) {
            tracing::debug!("Invalidating rejected access token");
            *cached = None;
        }
    }

    async fn exchange(&self, http: &reqwest::Client) -> Result<AccessToken, ApiError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);

        let query = ApiQueryParams::new()
            .add("grant_type", "client_credentials")
            .add("client_id", &self.client_id)
            .add("client_secret", &self.client_secret)
            .to_query_string();

        tracing::debug!("Requesting access token from {}", self.identity_url);

        let response = http
            .get(format!("{}{}", self.identity_url, query))
            .send()
            .await
            .map_err(|e| ApiError::transient(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transient(format!("Token response unreadable: {}", e)))?;

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::Transient {
                message: format!("Identity service returned HTTP {}", status.as_u16()),
                retry_after,
            });
        }

        let parsed = serde_json::from_str::<TokenResponse>(&text);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.error_description.or(r.error))
                .unwrap_or(text);
            tracing::error!("Credential exchange rejected: {}", detail);
            return Err(ApiError::Authentication(detail));
        }

        let parsed = parsed.map_err(|e| {
            ApiError::Parse(format!("Failed to parse token response: {}", e))
        })?;

        match (parsed.access_token, parsed.error) {
            (Some(value), None) if !value.is_empty() => {
                let expires_in = parsed.expires_in.unwrap_or(3600);
                tracing::debug!("Obtained access token valid for {}s", expires_in);
                Ok(AccessToken::issued(value, expires_in))
            }
            (_, error) => {
                let detail = parsed
                    .error_description
                    .or(error)
                    .unwrap_or_else(|| "identity service returned no access token".to_string());
                tracing::error!("Credential exchange rejected: {}", detail);
                Err(ApiError::Authentication(detail))
            }
        }
    }
}
