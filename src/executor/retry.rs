//! Retry configuration and status classification.

use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Default pause between rate-limited attempts.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for retry behavior.
///
/// Only rate-limited responses are retried; every other failure is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub retry_limit: u32,

    /// Fixed delay before retrying a rate-limited request.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            backoff: DEFAULT_RATE_LIMIT_BACKOFF,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            retry_limit: 0,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    pub fn with_retry_limit(mut self, retries: u32) -> Self {
        self.retry_limit = retries;
        self
    }

    /// Sets the delay between rate-limited attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retry_limit.saturating_add(1)
    }

    /// Returns whether another attempt may follow attempt number `attempt` (1-indexed).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

/// Classification of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx.
    Success,
    /// 4xx other than 429.
    ClientError,
    /// 5xx, and anything else outside 2xx/4xx.
    ServerError,
    /// 429 Too Many Requests.
    RateLimited,
}

impl StatusClass {
    /// Classifies an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            429 => Self::RateLimited,
            400..=499 => Self::ClientError,
            _ => Self::ServerError,
        }
    }

    /// Returns `true` if a request with this outcome may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.max_attempts(), 6);
        assert_eq!(config.backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts(), 1);
        assert!(!config.should_retry(1));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::new().with_retry_limit(2);
        assert!(config.should_retry(1));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(StatusClass::from_status(200), StatusClass::Success);
        assert_eq!(StatusClass::from_status(204), StatusClass::Success);
        assert_eq!(StatusClass::from_status(429), StatusClass::RateLimited);
        assert_eq!(StatusClass::from_status(404), StatusClass::ClientError);
        assert_eq!(StatusClass::from_status(500), StatusClass::ServerError);
        assert_eq!(StatusClass::from_status(302), StatusClass::ServerError);
        assert!(StatusClass::RateLimited.is_retryable());
        assert!(!StatusClass::ServerError.is_retryable());
    }
}
