//! Mock transport for testing.
//!
//! This module provides a route table that answers requests in-process,
//! so the upload flow can be exercised without a real API. Every request
//! is recorded and calls are counted per path.

use crate::transport::{Request, Response, Transport, TransportError};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

type Handler =
    Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Response, TransportError>> + Send + Sync>;

/// A mock transport answering requests from a route table keyed by path.
///
/// Paths without a route answer `404` with an empty body.
///
/// # Examples
///
/// ```rust
/// use nightfall::transport::{MockTransport, Response};
///
/// let transport = MockTransport::new()
///     .route("/v3/upload", |_| Response::new(200, r#"{"id":"..."}"#))
///     .route("/v3/scan", |_| Response::empty(429));
/// ```
#[derive(Default)]
pub struct MockTransport {
    /// Handlers keyed by URL path.
    routes: RwLock<HashMap<String, Handler>>,
    /// Every request received, in arrival order.
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Creates a mock transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests for `path` with a synchronous handler.
    pub fn route<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.route_async(path, move |request| {
            let response = handler(&request);
            async move { Ok(response) }
        })
    }

    /// Answers requests for `path` with an asynchronous handler.
    ///
    /// The handler may sleep to simulate a stalled server, or return a
    /// [`TransportError`] to simulate a network failure.
    pub fn route_async<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |request| handler(request).boxed());
        self.routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into(), handler);
        self
    }

    /// Returns the number of requests received for `path`.
    pub fn call_count(&self, path: &str) -> usize {
        self.lock_requests()
            .iter()
            .filter(|r| r.path() == path)
            .count()
    }

    /// Returns the total number of requests received.
    pub fn total_calls(&self) -> usize {
        self.lock_requests().len()
    }

    /// Returns a copy of every request received, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.lock_requests().clone()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<Request>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self
            .routes
            .read()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("MockTransport")
            .field("routes", &routes)
            .field("total_calls", &self.total_calls())
            .finish()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.lock_requests().push(request.clone());

        let handler = self
            .routes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(request.path())
            .cloned();

        match handler {
            Some(handler) => handler(request).await,
            None => Ok(Response::empty(404)),
        }
    }
}
