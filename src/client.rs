//! Tenable API client.
//!
//! Low-level HTTP client that handles authentication, retries and raw
//! requests. Paging and export workflows are built on top of it in
//! [`crate::pagination`] and [`crate::jobs`].

use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{Result, TioError};

/// Default Tenable Vulnerability Management URL.
pub const DEFAULT_API_URL: &str = "https://cloud.tenable.com";
/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default number of retries for 429/5xx responses.
pub const DEFAULT_RETRIES: u32 = 5;
/// Default initial backoff between retries.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Connection settings for a [`TioClient`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tioapi::{ClientConfig, TioClient};
///
/// # fn example() -> tioapi::Result<()> {
/// let config = ClientConfig::default()
///     .with_api_keys("access", "secret")
///     .with_timeout(Duration::from_secs(30))
///     .with_vendor("Acme")
///     .with_product("Inventory Sync");
/// let client = TioClient::with_config(config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    pub url: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    pub vendor: String,
    pub product: String,
    pub build: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            access_key: None,
            secret_key: None,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
            vendor: "unknown".to_string(),
            product: "unknown".to_string(),
            build: "unknown".to_string(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Set the base URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the API access and secret keys.
    #[must_use]
    pub fn with_api_keys(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many times a 429/5xx response is retried.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the initial backoff between retries.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the vendor name reported in the User-Agent.
    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Set the product name reported in the User-Agent.
    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    /// Set the build version reported in the User-Agent.
    #[must_use]
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = build.into();
        self
    }

    fn user_agent(&self) -> String {
        format!(
            "Integration/1.0 ({}; {}; Build/{}) tioapi/{} (Reqwest; Rust; {}/{})",
            self.vendor,
            self.product,
            self.build,
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

/// Low-level Tenable API client.
///
/// Handles authentication, retry of throttled and failed requests, and
/// JSON decoding. Entity-specific operations are implemented via the `Get`
/// and `List` traits on model types and via [`crate::jobs::ExportPoller`].
///
/// This struct is cheaply cloneable; clones reference the same underlying
/// connection pool.
///
/// # Example
///
/// ```no_run
/// use tioapi::TioClient;
///
/// # async fn example() -> tioapi::Result<()> {
/// // Create from environment variables
/// let client = TioClient::from_env()?;
///
/// // Or configure manually
/// let client = TioClient::new("access-key", "secret-key", "https://cloud.tenable.com")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TioClient {
    http: Client,
    base_url: Arc<Url>,
    api_keys: Option<Arc<str>>,
    retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for TioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TioClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl TioClient {
    /// Create a client from environment variables.
    ///
    /// Uses `TIO_ACCESS_KEY` and `TIO_SECRET_KEY` for authentication and
    /// optionally `TIO_URL` for the base URL (defaults to
    /// `https://cloud.tenable.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if either key is not set.
    pub fn from_env() -> Result<Self> {
        let access_key = env::var("TIO_ACCESS_KEY").map_err(|_| {
            TioError::ConfigMissing("TIO_ACCESS_KEY environment variable not set".to_string())
        })?;
        let secret_key = env::var("TIO_SECRET_KEY").map_err(|_| {
            TioError::ConfigMissing("TIO_SECRET_KEY environment variable not set".to_string())
        })?;

        let url = env::var("TIO_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        Self::with_config(
            ClientConfig::default()
                .with_url(url)
                .with_api_keys(access_key, secret_key),
        )
    }

    /// Create a new client with API keys and a base URL, using default
    /// timeouts and retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(access_key: &str, secret_key: &str, base_url: &str) -> Result<Self> {
        Self::with_config(
            ClientConfig::default()
                .with_url(base_url)
                .with_api_keys(access_key, secret_key),
        )
    }

    /// Create a client from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or invalid.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(TioError::ConfigMissing("no URL specified".to_string()));
        }

        // Ensure base URL ends with /
        let base_url_str = if config.url.ends_with('/') {
            config.url.clone()
        } else {
            format!("{}/", config.url)
        };
        let base_url = Url::parse(&base_url_str)?;

        let http = Client::builder()
            .user_agent(config.user_agent())
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .timeout(config.timeout)
            .build()?;

        let api_keys = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Some(Arc::from(format!("accessKey={access}; secretKey={secret}")))
            }
            _ => None,
        };

        Ok(Self {
            http,
            base_url: Arc::new(base_url),
            api_keys,
            retries: config.retries,
            backoff: config.backoff,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns true if API keys are configured.
    pub fn is_authenticated(&self) -> bool {
        self.api_keys.is_some()
    }

    /// Make a GET request and decode the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path)?;
        let response = self.execute(|| self.http.get(url.clone())).await?;
        Self::decode(response).await
    }

    /// Make a GET request with query parameters and decode the JSON response.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.base_url.join(path)?;
        let response = self
            .execute(|| self.http.get(url.clone()).query(query))
            .await?;
        Self::decode(response).await
    }

    /// Make a POST request with a JSON body and decode the JSON response.
    #[tracing::instrument(skip(self, body))]
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.base_url.join(path)?;
        let response = self
            .execute(|| self.http.post(url.clone()).json(body))
            .await?;
        Self::decode(response).await
    }

    /// Make a POST request without a body, ignoring the response body.
    #[tracing::instrument(skip(self))]
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.base_url.join(path)?;
        self.execute(|| self.http.post(url.clone())).await?;
        Ok(())
    }

    /// Make a GET request and return the raw response body.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.base_url.join(path)?;
        let response = self.execute(|| self.http.get(url.clone())).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Send a request, retrying throttled, failed and unreachable attempts.
    ///
    /// The closure is invoked once per attempt since a sent
    /// `RequestBuilder` cannot be reused.
    async fn execute<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            let mut request = build().header("Accept", "application/json");
            if let Some(keys) = &self.api_keys {
                request = request.header("X-APIKeys", keys.as_ref());
            }

            match request.send().await {
                Ok(response) if Self::is_retryable(response.status()) && attempt < self.retries => {
                    let delay = self.retry_delay(attempt, Some(&response));
                    tracing::warn!(
                        status = response.status().as_u16(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => return Self::check_response(response).await,
                Err(err) if attempt < self.retries && (err.is_connect() || err.is_timeout()) => {
                    let delay = self.retry_delay(attempt, None);
                    tracing::warn!(
                        error = %err,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request after transport error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }

            attempt += 1;
        }
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Exponential backoff, overridden by a `Retry-After` header if present.
    fn retry_delay(&self, attempt: u32, response: Option<&Response>) -> Duration {
        let retry_after = response
            .and_then(|r| r.headers().get("retry-after"))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        retry_after
            .unwrap_or_else(|| self.backoff.saturating_mul(2u32.saturating_pow(attempt)))
            .min(MAX_BACKOFF)
    }

    /// Decode a successful response body as JSON.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Check response status and convert errors.
    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let request_id = response
            .headers()
            .get("x-request-uuid")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let message = Self::extract_error_message(response, status).await;
        Err(TioError::Api {
            status_code: status.as_u16(),
            message,
            request_id,
        })
    }

    /// Extract error message from a failed response.
    async fn extract_error_message(response: Response, status: StatusCode) -> String {
        let fallback = || {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status}"))
        };

        let body = match response.text().await {
            Ok(b) => b,
            Err(_) => return fallback(),
        };

        // Try to parse as JSON and extract error/message field
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err) = json.get("error").and_then(|m| m.as_str()) {
                return err.to_string();
            }
            if let Some(msg) = json.get("message").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }

        if body.is_empty() {
            fallback()
        } else {
            body
        }
    }
}
