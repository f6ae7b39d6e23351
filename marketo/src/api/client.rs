use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tfplug::Context;

use super::auth::{AccessToken, Authenticator};
use super::common::{
    classify_error_code, parse_retry_after, ApiQueryParams, ApiResponse, EnvelopeFailure,
    FormParams,
};
use super::error::ApiError;

/// Marketo REST API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth: Authenticator,
    retry_config: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Per-attempt HTTP timeout
    pub timeout_seconds: u64,
    /// No retry is scheduled past this much time since the first attempt
    pub max_elapsed_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 10000,
            timeout_seconds: 10,
            max_elapsed_seconds: 60,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(std::cmp::min(
            self.initial_backoff_ms.saturating_mul(factor),
            self.max_backoff_ms,
        ))
    }
}

/// Outcome of a single HTTP attempt
enum Attempt {
    Done(Vec<serde_json::Value>),
    TokenRejected(String),
    Failed(ApiError),
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, client_id: &str, client_secret: &str) -> Result<Self, ApiError> {
        Self::with_config(endpoint, client_id, client_secret, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        endpoint: &str,
        client_id: &str,
        client_secret: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let base_url = normalize_endpoint(endpoint)?;

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ApiError::Configuration(
                "client id and secret must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(retry_config.timeout_seconds))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let auth = Authenticator::new(&base_url, client_id, client_secret);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth,
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry_config
    }

    /// Number of credential exchanges this client has performed
    pub fn token_exchanges(&self) -> usize {
        self.inner.auth.exchange_count()
    }

    /// Asset API operations
    pub fn assets(&self) -> crate::api::assets::AssetsApi<'_> {
        crate::api::assets::AssetsApi::new(self)
    }

    /// Execute a GET request with retry logic
    pub async fn get(
        &self,
        ctx: &Context,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let url = format!("{}{}{}", self.inner.base_url, path, params.to_query_string());
        self.execute_with_retry(
            ctx,
            |token| {
                let url = url.clone();
                async move {
                    tracing::debug!("GET request to: {}", url);

                    self.inner
                        .http_client
                        .get(&url)
                        .header(AUTHORIZATION, token.bearer())
                        .send()
                        .await
                }
            },
            path,
        )
        .await
    }

    /// Execute a form-encoded POST request with retry logic
    pub async fn post_form(
        &self,
        ctx: &Context,
        path: &str,
        form: &FormParams,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        self.execute_with_retry(
            ctx,
            |token| {
                let url = url.clone();
                async move {
                    tracing::debug!("POST request to: {}", url);

                    self.inner
                        .http_client
                        .post(&url)
                        .header(AUTHORIZATION, token.bearer())
                        .form(form.pairs())
                        .send()
                        .await
                }
            },
            path,
        )
        .await
    }

    /// Execute a JSON POST request with retry logic
    pub async fn post_json<B: Serialize + Sync>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        self.execute_with_retry(
            ctx,
            |token| {
                let url = url.clone();
                async move {
                    tracing::debug!("POST request to: {}", url);

                    self.inner
                        .http_client
                        .post(&url)
                        .header(AUTHORIZATION, token.bearer())
                        .json(body)
                        .send()
                        .await
                }
            },
            path,
        )
        .await
    }

    /// Execute request with token handling and retry logic.
    ///
    /// A rejected token is refreshed once per call. Transient failures are
    /// retried with exponential backoff, raised to the server's Retry-After,
    /// until either the retry count or the elapsed-time budget runs out.
    async fn execute_with_retry<F, Fut>(
        &self,
        ctx: &Context,
        request_fn: F,
        path: &str,
    ) -> Result<Vec<serde_json::Value>, ApiError>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let config = &self.inner.retry_config;
        let started = Instant::now();
        let max_elapsed = Duration::from_secs(config.max_elapsed_seconds);
        let mut retries = 0;
        let mut refreshed = false;

        loop {
            if ctx.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let error = match self.attempt(ctx, &request_fn).await {
                Ok(Attempt::Done(results)) => return Ok(results),
                Ok(Attempt::TokenRejected(message)) => {
                    if refreshed {
                        tracing::error!("Access token rejected again for {}: {}", path, message);
                        return Err(ApiError::Authentication(message));
                    }
                    tracing::debug!("Access token rejected for {}, refreshing", path);
                    refreshed = true;
                    continue;
                }
                Ok(Attempt::Failed(e)) | Err(e) => e,
            };

            if !error.is_retryable() {
                if !error.is_not_found() {
                    tracing::error!("Request to {} failed: {}", path, error);
                }
                return Err(error);
            }

            if retries >= config.max_retries {
                tracing::error!(
                    "Request to {} failed after {} retries: {}",
                    path,
                    retries,
                    error
                );
                return Err(error);
            }

            retries += 1;
            let mut delay = config.backoff(retries);
            if let ApiError::Transient {
                retry_after: Some(retry_after),
                ..
            } = &error
            {
                delay = delay.max(*retry_after);
            }

            if started.elapsed() + delay > max_elapsed {
                tracing::error!(
                    "Giving up on {}: next retry would exceed {}s",
                    path,
                    config.max_elapsed_seconds
                );
                return Err(error);
            }

            tracing::warn!(
                "Retrying request to {} after {}ms (attempt {}): {}",
                path,
                delay.as_millis(),
                retries,
                error
            );

            tokio::select! {
                _ = ctx.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One authenticated HTTP attempt
    async fn attempt<F, Fut>(&self, ctx: &Context, request_fn: &F) -> Result<Attempt, ApiError>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let token = self.inner.auth.token(ctx, &self.inner.http_client).await?;

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            response = request_fn(token.clone()) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                return Ok(Attempt::Failed(ApiError::from_transport(
                    e,
                    self.inner.retry_config.timeout_seconds,
                )))
            }
        };

        let attempt = tokio::select! {
            _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            attempt = self.parse_response(response) => attempt,
        };

        if let Attempt::TokenRejected(_) = &attempt {
            self.inner.auth.invalidate(&token).await;
        }
        Ok(attempt)
    }

    /// Map HTTP status and envelope into an attempt outcome
    async fn parse_response(&self, response: reqwest::Response) -> Attempt {
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Attempt::Failed(ApiError::from_transport(
                    e,
                    self.inner.retry_config.timeout_seconds,
                ))
            }
        };

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Attempt::TokenRejected(format!("HTTP 401: {}", text));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Attempt::Failed(ApiError::NotFound(text));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Failed(ApiError::Transient {
                message: format!("HTTP {}: {}", status.as_u16(), text),
                retry_after,
            });
        }

        if !status.is_success() {
            return Attempt::Failed(ApiError::Validation {
                status: status.as_u16(),
                code: None,
                message: text,
            });
        }

        tracing::debug!("API response body: {}", text);

        let envelope = match serde_json::from_str::<ApiResponse<serde_json::Value>>(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                return Attempt::Failed(ApiError::Parse(format!(
                    "Failed to parse response: {}",
                    e
                )));
            }
        };

        if !envelope.warnings.is_empty() {
            tracing::warn!("API warnings: {}", envelope.warnings.join("; "));
        }

        if envelope.success {
            return Attempt::Done(envelope.result);
        }

        let first_code = envelope.errors.first().map(|e| e.code.clone());
        if first_code.as_deref().map(classify_error_code) == Some(EnvelopeFailure::TokenRejected)
        {
            return Attempt::TokenRejected(super::common::describe_errors(&envelope.errors));
        }

        Attempt::Failed(envelope.into_error(status.as_u16(), retry_after))
    }
}

/// Validate the endpoint and reduce it to scheme://host[:port][/prefix].
/// A trailing `/rest` (as shown in the Marketo admin console) is dropped.
pub(crate) fn normalize_endpoint(endpoint: &str) -> Result<String, ApiError> {
    let parsed = url::Url::parse(endpoint.trim())
        .map_err(|e| ApiError::Configuration(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ApiError::Configuration(format!(
            "Invalid endpoint '{}': scheme must be http or https",
            endpoint
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ApiError::Configuration(format!(
            "Invalid endpoint '{}': missing host",
            endpoint
        )));
    }

    let trimmed = parsed.as_str().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/rest").unwrap_or(trimmed);
    Ok(trimmed.to_string())
}

/// Decode the first element of a result list
pub fn first_result<T: DeserializeOwned>(
    results: Vec<serde_json::Value>,
    what: &str,
) -> Result<T, ApiError> {
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", what)))?;
    serde_json::from_value(first)
        .map_err(|e| ApiError::Parse(format!("Failed to parse {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalization() {
        assert_eq!(
            normalize_endpoint("https://123-ABC-456.mktorest.com/rest/").unwrap(),
            "https://123-ABC-456.mktorest.com"
        );
        assert_eq!(
            normalize_endpoint("http://localhost:8080").unwrap(),
            "http://localhost:8080"
        );
        assert!(matches!(
            normalize_endpoint("ftp://example.com"),
            Err(ApiError::Configuration(_))
        ));
        assert!(matches!(
            normalize_endpoint("not a url"),
            Err(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            ..Default::default()
        };

        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(350));
        assert_eq!(config.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn client_rejects_empty_credentials() {
        let result = Client::new("https://example.mktorest.com", "", "secret");
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }

    #[test]
    fn first_result_requires_an_element() {
        let empty: Result<serde_json::Value, _> = first_result(vec![], "program 7");
        assert!(matches!(empty, Err(ApiError::NotFound(msg)) if msg == "program 7 not found"));
    }
}
