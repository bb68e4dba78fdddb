//! Transport implementations.
//!
//! The client never talks to the network directly. Every request goes
//! through a [`Transport`], which performs exactly one HTTP exchange and
//! reports the status code and body. Retries, decoding and error mapping
//! happen above this layer.
//!
//! ## Available Transports
//!
//! - [`mock`] - An in-process route table for tests
//! - [`http`] - `reqwest` based transport (requires `reqwest-transport` feature)
//!
//! ## Implementing a Custom Transport
//!
//! ```rust,ignore
//! use nightfall::transport::{Request, Response, Transport, TransportError};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&self, request: Request) -> Result<Response, TransportError> {
//!         // Perform the exchange
//!         todo!()
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod mock;

#[cfg(feature = "reqwest-transport")]
pub mod http;

pub use mock::MockTransport;

#[cfg(feature = "reqwest-transport")]
pub use http::ReqwestTransport;

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body. Empty for bodiless requests.
    ///
    /// Cloning a request shares the body instead of copying it.
    pub body: Bytes,
}

impl Request {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the first value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the path component of the URL.
    pub fn path(&self) -> &str {
        let without_scheme = match self.url.find("://") {
            Some(idx) => &self.url[idx + 3..],
            None => self.url.as_str(),
        };
        let path = match without_scheme.find('/') {
            Some(idx) => &without_scheme[idx..],
            None => "/",
        };
        path.split(['?', '#']).next().unwrap_or(path)
    }
}

/// The status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body. Empty when the server sent none.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    /// Creates a response whose body is the JSON encoding of `value`.
    pub fn json<T: serde::Serialize>(status: u16, value: &T) -> Self {
        Self::new(status, serde_json::to_vec(value).unwrap_or_default())
    }
}

/// A request that produced no response at all.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Performs one HTTP exchange.
///
/// Implementations must be `Send + Sync`: a single transport is shared by
/// every concurrent chunk upload. A non-2xx status is not an error at this
/// layer; only failures that produced no response are.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends the request and returns the status and body.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

/// A shared transport.
pub type ArcTransport = Arc<dyn Transport>;
