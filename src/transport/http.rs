//! `reqwest` transport.
//!
//! # Requirements
//!
//! - The `reqwest-transport` feature (enabled by default)
//! - Network access to the configured base URL

use async_trait::async_trait;

use crate::core::NightfallError;
use crate::transport::{Method, Request, Response, Transport, TransportError};

/// Transport backed by a shared `reqwest::Client`.
///
/// # Example
///
/// ```rust,ignore
/// use nightfall::transport::ReqwestTransport;
///
/// let transport = ReqwestTransport::new()?;
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    pub fn new() -> Result<Self, NightfallError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            NightfallError::configuration(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Creates a transport from an existing client, for custom proxies or TLS.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::with_source("request failed", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::with_source("failed to read response body", e))?;

        Ok(Response::new(status, body.to_vec()))
    }
}
