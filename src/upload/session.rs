//! The upload session state machine.

use std::fmt;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit;
use crate::core::types::InitiateUploadRequest;
use crate::core::{
    ClientConfig, NightfallError, Result, ScanFileRequest, ScanFileResponse, UploadSession,
};
use crate::executor::RequestExecutor;
use crate::transport::{Method, Request};
use crate::upload::orchestrator::ChunkedUploader;
use crate::upload::paths;

/// Lifecycle state of a file scan.
///
/// ```text
/// NotStarted -> Initiated -> Uploading -> Uploaded -> Finalized -> ProcessingTriggered
///      \______________\____________\___________\___________\--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// No request has been made yet.
    NotStarted,
    /// The API created an upload session.
    Initiated,
    /// Chunks are being uploaded.
    Uploading,
    /// Every chunk was uploaded; the session is not finalized yet.
    Uploaded,
    /// The API accepted the complete upload.
    Finalized,
    /// The scan was triggered. Terminal.
    ProcessingTriggered,
    /// A step failed. Terminal.
    Failed,
}

impl UploadState {
    /// Returns `true` if no further step may run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ProcessingTriggered | Self::Failed)
    }

    /// Returns the state name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Initiated => "initiated",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Finalized => "finalized",
            Self::ProcessingTriggered => "processing_triggered",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one file through initiate, upload, finalize and scan.
///
/// Steps must run in order; the first failure moves the flow to
/// [`UploadState::Failed`] and every later step is refused. Nothing is
/// rolled back: an abandoned session is left for the API to expire.
///
/// Most callers want [`NightfallClient::scan_file`](crate::NightfallClient::scan_file),
/// which runs every step under one deadline. Use the flow directly to
/// interleave other work between steps.
///
/// ```rust,ignore
/// let mut flow = client.begin_file_scan();
/// let cancel = CancellationToken::new();
///
/// let session = flow.initiate(size, &cancel).await?.clone();
/// flow.upload(&mut file, &cancel).await?;
/// flow.finalize(&cancel).await?;
/// let response = flow.trigger_processing(&request, &cancel).await?;
/// ```
#[derive(Debug)]
pub struct FileScanFlow {
    executor: RequestExecutor,
    uploader: ChunkedUploader,
    config: Arc<ClientConfig>,
    state: UploadState,
    session: Option<UploadSession>,
}

impl FileScanFlow {
    /// Creates a flow in the `NotStarted` state.
    pub fn new(executor: RequestExecutor, config: Arc<ClientConfig>) -> Self {
        let uploader = ChunkedUploader::new(executor.clone(), Arc::clone(&config));
        Self {
            executor,
            uploader,
            config,
            state: UploadState::NotStarted,
            session: None,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Returns the session, once initiated.
    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    /// Runs every step in order and returns the scan response.
    pub async fn run<R>(
        &mut self,
        request: &ScanFileRequest,
        content: &mut R,
        cancel: &CancellationToken,
    ) -> Result<ScanFileResponse>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.initiate(request.content_size_bytes, cancel).await?;
        self.upload(content, cancel).await?;
        self.finalize(cancel).await?;
        self.trigger_processing(request, cancel).await
    }

    /// Asks the API for an upload session for `file_size_bytes` bytes.
    pub async fn initiate(
        &mut self,
        file_size_bytes: u64,
        cancel: &CancellationToken,
    ) -> Result<&UploadSession> {
        self.expect_state(UploadState::NotStarted, "initiate")?;

        let request = RequestExecutor::json_request(
            Method::Post,
            self.config.endpoint(paths::INITIATE),
            &InitiateUploadRequest { file_size_bytes },
        )?;

        let result = self
            .executor
            .execute_json::<UploadSession>(request, cancel)
            .await
            .and_then(|session| {
                session.ok_or_else(|| {
                    NightfallError::unexpected_response("upload session response was empty")
                })
            });

        match result {
            Ok(session) => {
                audit::emit_upload_initiated(&session);
                self.state = UploadState::Initiated;
                Ok(&*self.session.insert(session))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Uploads every chunk of `content`.
    pub async fn upload<R>(&mut self, content: &mut R, cancel: &CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.expect_state(UploadState::Initiated, "upload")?;
        let session = self.current_session()?.clone();
        self.transition(UploadState::Uploading);

        match self.uploader.upload(&session, content, cancel).await {
            Ok(()) => {
                audit::emit_chunks_uploaded(&session);
                self.transition(UploadState::Uploaded);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Marks the upload as complete.
    pub async fn finalize(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.expect_state(UploadState::Uploaded, "finalize")?;
        let id = self.current_session()?.id;

        let request = Request::new(Method::Post, self.config.endpoint(&paths::finish(&id)));
        match self.executor.execute_unit(request, cancel).await {
            Ok(()) => {
                audit::emit_upload_finalized(&id);
                self.transition(UploadState::Finalized);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Triggers the scan of the finalized upload.
    pub async fn trigger_processing(
        &mut self,
        request: &ScanFileRequest,
        cancel: &CancellationToken,
    ) -> Result<ScanFileResponse> {
        self.expect_state(UploadState::Finalized, "trigger processing")?;
        let id = self.current_session()?.id;

        let result = match scan_request(&self.config, &id, request) {
            Ok(http_request) => self
                .executor
                .execute_json::<ScanFileResponse>(http_request, cancel)
                .await
                .and_then(|response| {
                    response.ok_or_else(|| {
                        NightfallError::unexpected_response("scan response was empty")
                    })
                }),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                audit::emit_scan_triggered(&id, &response);
                self.transition(UploadState::ProcessingTriggered);
                Ok(response)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn expect_state(&self, expected: UploadState, step: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(NightfallError::internal(format!(
            "cannot {} an upload in state '{}'",
            step, self.state
        )))
    }

    fn current_session(&self) -> Result<&UploadSession> {
        self.session
            .as_ref()
            .ok_or_else(|| NightfallError::internal("upload session missing"))
    }

    fn transition(&mut self, next: UploadState) {
        tracing::debug!(
            session_id = ?self.session.as_ref().map(|s| s.id),
            from = %self.state,
            to = %next,
            "Upload state changed"
        );
        self.state = next;
    }

    /// Moves the flow to `Failed`, recording `error` as the cause.
    pub(crate) fn fail(&mut self, error: NightfallError) -> NightfallError {
        audit::emit_upload_failed(
            self.session.as_ref().map(|s| &s.id),
            self.state,
            &error,
        );
        self.transition(UploadState::Failed);
        error
    }
}

fn scan_request(config: &ClientConfig, id: &Uuid, request: &ScanFileRequest) -> Result<Request> {
    RequestExecutor::json_request(Method::Post, config.endpoint(&paths::scan(id)), request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RetryConfig;
    use crate::transport::{MockTransport, Response};
    use serde_json::json;
    use std::io::Cursor;

    const ID: &str = "430d42aa-1e1f-405d-8799-7f5f26486a0d";

    fn flow(transport: Arc<MockTransport>) -> FileScanFlow {
        let config = Arc::new(ClientConfig::new("key").with_base_url("http://mock"));
        let executor = RequestExecutor::new(transport, RetryConfig::no_retry(), &config.api_key);
        FileScanFlow::new(executor, config)
    }

    fn healthy_transport() -> MockTransport {
        MockTransport::new()
            .route("/v3/upload", |_| {
                Response::json(200, &json!({"id": ID, "fileSizeBytes": 15, "chunkSize": 5}))
            })
            .route(format!("/v3/upload/{ID}"), |_| Response::empty(200))
            .route(format!("/v3/upload/{ID}/finish"), |_| Response::empty(200))
            .route(format!("/v3/upload/{ID}/scan"), |_| {
                Response::json(200, &json!({"id": ID, "message": "scan initiated"}))
            })
    }

    #[tokio::test]
    async fn test_steps_advance_state() {
        let transport = Arc::new(healthy_transport());
        let mut flow = flow(Arc::clone(&transport));
        let cancel = CancellationToken::new();
        let request = ScanFileRequest::new(15).with_policy_uuid("policy-1");
        assert_eq!(flow.state(), UploadState::NotStarted);

        let session = flow.initiate(15, &cancel).await.unwrap();
        assert_eq!(session.chunk_size, 5);
        assert_eq!(flow.state(), UploadState::Initiated);

        flow.upload(&mut Cursor::new(vec![0u8; 15]), &cancel)
            .await
            .unwrap();
        assert_eq!(flow.state(), UploadState::Uploaded);

        flow.finalize(&cancel).await.unwrap();
        assert_eq!(flow.state(), UploadState::Finalized);

        let response = flow.trigger_processing(&request, &cancel).await.unwrap();
        assert_eq!(response.message, "scan initiated");
        assert_eq!(flow.state(), UploadState::ProcessingTriggered);
        assert!(flow.state().is_terminal());

        let initiate = &transport.requests()[0];
        let body: serde_json::Value = serde_json::from_slice(&initiate.body).unwrap();
        assert_eq!(body, json!({"fileSizeBytes": 15}));

        let scan = transport
            .requests()
            .into_iter()
            .find(|r| r.path().ends_with("/scan"))
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&scan.body).unwrap();
        assert_eq!(body["policyUUID"], "policy-1");
    }

    #[tokio::test]
    async fn test_out_of_order_step_is_refused() {
        let transport = Arc::new(healthy_transport());
        let mut flow = flow(Arc::clone(&transport));

        let err = flow.finalize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, NightfallError::Internal { .. }));
        assert_eq!(flow.state(), UploadState::NotStarted);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_initiate_failure_moves_to_failed() {
        let transport =
            Arc::new(MockTransport::new().route("/v3/upload", |_| Response::empty(500)));
        let mut flow = flow(Arc::clone(&transport));
        let cancel = CancellationToken::new();

        assert!(flow.initiate(15, &cancel).await.is_err());
        assert_eq!(flow.state(), UploadState::Failed);

        // Failed is terminal.
        let err = flow
            .upload(&mut Cursor::new(vec![0u8; 15]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, NightfallError::Internal { .. }));
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_initiate_body_is_unexpected() {
        let transport =
            Arc::new(MockTransport::new().route("/v3/upload", |_| Response::empty(200)));
        let mut flow = flow(transport);

        let err = flow
            .initiate(15, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NightfallError::UnexpectedResponse { .. }));
        assert_eq!(flow.state(), UploadState::Failed);
    }

    #[tokio::test]
    async fn test_finalize_failure_skips_scan() {
        let transport = Arc::new(
            healthy_transport().route(format!("/v3/upload/{ID}/finish"), |_| {
                Response::new(500, r#"{"code":50000,"message":"could not finish"}"#)
            }),
        );
        let request = ScanFileRequest::new(15);

        let err = flow(Arc::clone(&transport))
            .run(&request, &mut Cursor::new(vec![0u8; 15]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.call_count(&format!("/v3/upload/{ID}/finish")), 1);
        assert_eq!(transport.call_count(&format!("/v3/upload/{ID}/scan")), 0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(UploadState::ProcessingTriggered.to_string(), "processing_triggered");
        assert!(UploadState::Failed.is_terminal());
        assert!(!UploadState::Uploaded.is_terminal());
    }
}
