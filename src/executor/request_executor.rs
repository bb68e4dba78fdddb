//! The retrying request executor.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{ApiError, NightfallError, Result, USER_AGENT};
use crate::executor::retry::{RetryConfig, StatusClass};
use crate::transport::{ArcTransport, Method, Request, Response};

/// Executes requests through a [`Transport`](crate::transport::Transport),
/// retrying rate-limited responses.
///
/// The executor is stateless across calls and cheap to clone, so every
/// chunk upload task gets its own handle. Each call:
///
/// - attempts the request up to `retry_limit + 1` times,
/// - sleeps the fixed backoff between rate-limited attempts,
/// - returns any other non-2xx response as an [`ApiError`] without retrying,
/// - reports [`NightfallError::Cancelled`] when the token fires, whether the
///   request was in flight or waiting out the backoff.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    transport: ArcTransport,
    retry: RetryConfig,
    authorization: Arc<SecretString>,
}

impl RequestExecutor {
    /// Creates an executor that authenticates with `api_key`.
    pub fn new(transport: ArcTransport, retry: RetryConfig, api_key: &SecretString) -> Self {
        let authorization = format!("Bearer {}", api_key.expose_secret());
        Self {
            transport,
            retry,
            authorization: Arc::new(SecretString::new(authorization.into())),
        }
    }

    /// Returns the retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Builds a request with a JSON body.
    pub fn json_request<B: Serialize + ?Sized>(
        method: Method,
        url: impl Into<String>,
        body: &B,
    ) -> Result<Request> {
        Ok(Request::new(method, url)
            .with_header("Content-Type", "application/json")
            .with_body(serde_json::to_vec(body)?))
    }

    /// Executes the request and returns the successful response.
    pub async fn execute(&self, request: Request, cancel: &CancellationToken) -> Result<Response> {
        let request = self.authorize(request);
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self.send_once(&request, cancel).await?;

            match StatusClass::from_status(response.status) {
                StatusClass::Success => return Ok(response),
                class if class.is_retryable() && self.retry.should_retry(attempt) => {
                    tracing::debug!(
                        method = %request.method,
                        path = request.path(),
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "Rate limited, retrying"
                    );
                    self.wait_backoff(cancel).await?;
                }
                class => {
                    let error = ApiError::from_response(response.status, &response.body);
                    tracing::debug!(
                        method = %request.method,
                        path = request.path(),
                        status = response.status,
                        class = ?class,
                        attempt = attempt,
                        "Request failed"
                    );
                    return Err(error.into());
                }
            }
        }
    }

    /// Executes the request and decodes the body.
    ///
    /// An empty body decodes to `None`.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        let response = self.execute(request, cancel).await?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&response.body)?))
    }

    /// Executes the request and discards the body.
    pub async fn execute_unit(&self, request: Request, cancel: &CancellationToken) -> Result<()> {
        self.execute(request, cancel).await.map(|_| ())
    }

    fn authorize(&self, request: Request) -> Request {
        request
            .with_header("Authorization", self.authorization.expose_secret())
            .with_header("User-Agent", USER_AGENT)
    }

    async fn send_once(&self, request: &Request, cancel: &CancellationToken) -> Result<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NightfallError::Cancelled),
            result = self.transport.send(request.clone()) => result.map_err(|e| {
                if cancel.is_cancelled() {
                    NightfallError::Cancelled
                } else {
                    NightfallError::Transport(e)
                }
            }),
        }
    }

    async fn wait_backoff(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NightfallError::Cancelled),
            _ = tokio::time::sleep(self.retry.backoff) => Ok(()),
        }
    }
}
