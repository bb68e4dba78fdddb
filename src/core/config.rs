//! Client configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::core::error::{NightfallError, Result};
use crate::executor::RetryConfig;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.nightfall.ai/";

/// Environment variable read by [`ClientConfig::from_env`].
pub const API_KEY_ENV: &str = "NIGHTFALL_API_KEY";

/// Default number of chunks uploaded at the same time.
pub const DEFAULT_FILE_UPLOAD_CONCURRENCY: usize = 1;

/// Largest accepted chunk upload concurrency.
pub const MAX_FILE_UPLOAD_CONCURRENCY: usize = 100;

/// Identifies this client to the API. Computed at compile time.
pub const USER_AGENT: &str = concat!("nightfall-rust-sdk/", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`NightfallClient`](crate::NightfallClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API. Override for non-production environments.
    pub base_url: String,

    /// Retry behavior for rate-limited requests.
    pub retry: RetryConfig,

    /// Number of chunks uploaded concurrently, in `[1, 100]`.
    pub file_upload_concurrency: usize,

    /// Default deadline for a whole file scan, used when the request has none.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Creates a configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into().into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
            file_upload_concurrency: DEFAULT_FILE_UPLOAD_CONCURRENCY,
            timeout: None,
        }
    }

    /// Creates a configuration with the API key taken from `NIGHTFALL_API_KEY`.
    ///
    /// A missing variable yields an empty key, which [`validate`](Self::validate)
    /// rejects.
    pub fn from_env() -> Self {
        Self::new(std::env::var(API_KEY_ENV).unwrap_or_default())
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the number of chunks uploaded concurrently.
    pub fn with_file_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.file_upload_concurrency = concurrency;
        self
    }

    /// Sets the default deadline for a whole file scan.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks the configuration before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.expose_secret().is_empty() {
            return Err(NightfallError::configuration("missing api key"));
        }

        if !(1..=MAX_FILE_UPLOAD_CONCURRENCY).contains(&self.file_upload_concurrency) {
            return Err(NightfallError::configuration(format!(
                "file upload concurrency must be in range [1,{}], got {}",
                MAX_FILE_UPLOAD_CONCURRENCY, self.file_upload_concurrency
            )));
        }

        if self.base_url.trim().is_empty() {
            return Err(NightfallError::configuration("base url is empty"));
        }

        Ok(())
    }

    /// Joins an API path onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
