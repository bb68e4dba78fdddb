//! The Nightfall API client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::audit;
use crate::core::{
    ClientConfig, NightfallError, Result, ScanFileRequest, ScanFileResponse, ScanTextRequest,
    ScanTextResponse,
};
use crate::executor::RequestExecutor;
use crate::transport::{ArcTransport, Method, Transport};
use crate::upload::{paths, FileScanFlow};

/// Builder for creating a `NightfallClient`.
#[derive(Debug, Default)]
pub struct NightfallClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<ArcTransport>,
}

impl NightfallClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration. Defaults to [`ClientConfig::from_env`].
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the transport.
    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.with_arc_transport(Arc::new(transport))
    }

    /// Sets a transport wrapped in an Arc.
    pub fn with_arc_transport(mut self, transport: ArcTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<NightfallClient> {
        let config = self.config.unwrap_or_else(ClientConfig::from_env);
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let executor = RequestExecutor::new(transport, config.retry.clone(), &config.api_key);

        tracing::debug!(
            base_url = %config.base_url,
            file_upload_concurrency = config.file_upload_concurrency,
            retry_limit = config.retry.retry_limit,
            "Nightfall client created"
        );

        Ok(NightfallClient {
            config: Arc::new(config),
            executor,
        })
    }
}

#[cfg(feature = "reqwest-transport")]
fn default_transport() -> Result<ArcTransport> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()?))
}

#[cfg(not(feature = "reqwest-transport"))]
fn default_transport() -> Result<ArcTransport> {
    Err(NightfallError::configuration(
        "no transport configured and the `reqwest-transport` feature is disabled",
    ))
}

/// Client for the Nightfall scanning API.
///
/// The client is cheap to clone and safe to share between tasks. It holds
/// no per-scan state; every call runs its own upload session.
#[derive(Debug, Clone)]
pub struct NightfallClient {
    config: Arc<ClientConfig>,
    executor: RequestExecutor,
}

impl NightfallClient {
    /// Creates a new builder.
    pub fn builder() -> NightfallClientBuilder {
        NightfallClientBuilder::new()
    }

    /// Creates a client with the default transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// Creates a client configured from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts a step-by-step file scan.
    pub fn begin_file_scan(&self) -> FileScanFlow {
        FileScanFlow::new(self.executor.clone(), Arc::clone(&self.config))
    }

    /// Uploads `content` and triggers a scan of it.
    ///
    /// Returns once the API has accepted the scan; findings are delivered
    /// asynchronously to the policy's alert destinations. The content is
    /// read up to `request.content_size_bytes` and is not closed.
    pub async fn scan_file<R>(
        &self,
        request: &ScanFileRequest,
        content: &mut R,
    ) -> Result<ScanFileResponse>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.scan_file_with_cancellation(request, content, &CancellationToken::new())
            .await
    }

    /// Like [`scan_file`](Self::scan_file), stopping early when `cancel` fires.
    ///
    /// The whole sequence is bounded by `request.timeout`, or the client's
    /// default timeout when the request has none.
    pub async fn scan_file_with_cancellation<R>(
        &self,
        request: &ScanFileRequest,
        content: &mut R,
        cancel: &CancellationToken,
    ) -> Result<ScanFileResponse>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let scope = cancel.child_token();
        let _guard = scope.clone().drop_guard();
        let mut flow = self.begin_file_scan();

        tracing::info!(
            content_size_bytes = request.content_size_bytes,
            policy_uuid = ?request.policy_uuid,
            "Scanning file"
        );

        let deadline = request.timeout.or(self.config.timeout);
        let result = with_deadline(deadline, &scope, flow.run(request, content, &scope)).await;
        match result {
            Err(e @ NightfallError::Timeout { .. }) => Err(flow.fail(e)),
            result => result,
        }
    }

    /// Scans text synchronously and returns the findings.
    pub async fn scan_text(&self, request: &ScanTextRequest) -> Result<ScanTextResponse> {
        self.scan_text_with_cancellation(request, &CancellationToken::new())
            .await
    }

    /// Like [`scan_text`](Self::scan_text), stopping early when `cancel` fires.
    pub async fn scan_text_with_cancellation(
        &self,
        request: &ScanTextRequest,
        cancel: &CancellationToken,
    ) -> Result<ScanTextResponse> {
        let scope = cancel.child_token();
        let _guard = scope.clone().drop_guard();

        let http_request = RequestExecutor::json_request(
            Method::Post,
            self.config.endpoint(paths::SCAN_TEXT),
            request,
        )?;

        let call = async {
            self.executor
                .execute_json::<ScanTextResponse>(http_request, &scope)
                .await?
                .ok_or_else(|| NightfallError::unexpected_response("scan response was empty"))
        };

        let response = with_deadline(self.config.timeout, &scope, call).await?;
        audit::emit_text_scanned(request.payload.len(), &response);
        Ok(response)
    }
}

/// Runs `op`, giving up with a `Timeout` error once `limit` elapses.
///
/// On timeout `scope` is cancelled so work spawned by `op` stops too.
async fn with_deadline<T, F>(
    limit: Option<Duration>,
    scope: &CancellationToken,
    op: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(limit) = limit else {
        return op.await;
    };

    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => {
            scope.cancel();
            tracing::warn!(timeout = ?limit, "Deadline elapsed");
            Err(NightfallError::Timeout { elapsed: limit })
        }
    }
}
