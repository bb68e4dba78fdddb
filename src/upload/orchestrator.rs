//! Concurrent chunk uploads.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::{ClientConfig, NightfallError, Result, UploadSession};
use crate::executor::RequestExecutor;
use crate::transport::{Method, Request};
use crate::upload::budget::UploadBudget;
use crate::upload::paths;
use crate::upload::plan::{ChunkPlan, ChunkRange};

/// Header carrying the byte offset of an uploaded chunk.
pub const UPLOAD_OFFSET_HEADER: &str = "X-Upload-Offset";

/// Uploads the content of a session chunk by chunk.
///
/// Chunks are read from the source strictly in offset order and uploaded
/// concurrently, at most `file_upload_concurrency` at a time. The first
/// failed chunk cancels every other upload of the same call and becomes the
/// call's error; later errors are dropped.
#[derive(Debug, Clone)]
pub struct ChunkedUploader {
    executor: RequestExecutor,
    config: Arc<ClientConfig>,
}

impl ChunkedUploader {
    /// Creates an uploader.
    pub fn new(executor: RequestExecutor, config: Arc<ClientConfig>) -> Self {
        Self { executor, config }
    }

    /// Uploads the content of `source` for `session`.
    ///
    /// The source is consumed but not closed. A source that ends before
    /// `session.file_size_bytes` is not an error: the upload stops at the
    /// true end of the data.
    pub async fn upload<R>(
        &self,
        session: &UploadSession,
        source: &mut R,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let budget = UploadBudget::new(self.config.file_upload_concurrency);
        self.upload_with_budget(session, source, &budget, cancel)
            .await
    }

    /// Uploads the content of `source` under an explicit budget.
    pub async fn upload_with_budget<R>(
        &self,
        session: &UploadSession,
        source: &mut R,
        budget: &UploadBudget,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        if session.chunk_size == 0 && session.file_size_bytes > 0 {
            return Err(NightfallError::unexpected_response(
                "upload session has a zero chunk size",
            ));
        }

        let url = self.config.endpoint(&paths::chunk(&session.id));
        let scope = cancel.child_token();
        let first_error = Arc::new(FirstError::default());
        let mut tasks = JoinSet::new();
        let mut dispatched = 0u64;
        let mut interrupted = false;

        tracing::info!(
            session_id = %session.id,
            file_size_bytes = session.file_size_bytes,
            chunk_size = session.chunk_size,
            chunk_count = session.chunk_count(),
            concurrency = budget.max_concurrent(),
            "Uploading chunks"
        );

        for chunk in ChunkPlan::new(session.file_size_bytes, session.chunk_size) {
            if budget.is_full() {
                tracing::trace!(
                    session_id = %session.id,
                    offset = chunk.offset,
                    "Waiting for an upload slot"
                );
            }
            let Some(permit) = budget.acquire(&scope).await else {
                interrupted = true;
                break;
            };

            // A chunk may have failed while we waited for the permit.
            if scope.is_cancelled() {
                interrupted = true;
                break;
            }

            let data = match read_chunk(source, chunk.len, &scope).await {
                Ok(data) => data,
                Err(e) => {
                    first_error.record(e);
                    scope.cancel();
                    break;
                }
            };

            if data.is_empty() {
                tracing::debug!(
                    session_id = %session.id,
                    offset = chunk.offset,
                    "Content ended before the planned size"
                );
                break;
            }

            let request = chunk_request(&url, chunk, data);
            let executor = self.executor.clone();
            let task_scope = scope.clone();
            let task_error = Arc::clone(&first_error);
            let session_id = session.id;

            tasks.spawn(async move {
                let _permit = permit;
                match executor.execute_unit(request, &task_scope).await {
                    Ok(()) => {
                        tracing::trace!(
                            session_id = %session_id,
                            offset = chunk.offset,
                            len = chunk.len,
                            "Chunk uploaded"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            offset = chunk.offset,
                            error = %e,
                            "Chunk upload failed"
                        );
                        task_error.record(e);
                        task_scope.cancel();
                    }
                }
            });
            dispatched += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                first_error.record(NightfallError::internal(format!(
                    "chunk upload task failed: {}",
                    e
                )));
                scope.cancel();
            }
        }

        if let Some(e) = first_error.take() {
            return Err(e);
        }
        if interrupted {
            return Err(NightfallError::Cancelled);
        }

        tracing::info!(
            session_id = %session.id,
            chunks = dispatched,
            "All chunks uploaded"
        );
        Ok(())
    }
}

/// Single-assignment error slot. The first recorded error wins.
#[derive(Debug, Default)]
struct FirstError(Mutex<Option<NightfallError>>);

impl FirstError {
    fn record(&self, error: NightfallError) -> bool {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(error);
        true
    }

    fn take(&self) -> Option<NightfallError> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

fn chunk_request(url: &str, chunk: ChunkRange, data: Vec<u8>) -> Request {
    Request::new(Method::Patch, url)
        .with_header("Content-Type", "application/octet-stream")
        .with_header(UPLOAD_OFFSET_HEADER, chunk.offset.to_string())
        .with_body(data)
}

/// Reads up to `len` bytes, stopping early only at the end of the source.
async fn read_chunk<R>(source: &mut R, len: u64, cancel: &CancellationToken) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let read = async move {
        let mut data = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        (&mut *source).take(len).read_to_end(&mut data).await?;
        Ok::<_, NightfallError>(data)
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NightfallError::Cancelled),
        result = read => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RetryConfig;
    use crate::transport::{MockTransport, Response};
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::ReadBuf;
    use uuid::Uuid;

    const SESSION_ID: &str = "430d42aa-1e1f-405d-8799-7f5f26486a0d";

    fn chunk_path() -> String {
        format!("/v3/upload/{}", SESSION_ID)
    }

    fn session(file_size_bytes: u64, chunk_size: u64) -> UploadSession {
        UploadSession {
            id: Uuid::parse_str(SESSION_ID).unwrap(),
            file_size_bytes,
            chunk_size,
            mime_type: None,
        }
    }

    fn uploader(transport: Arc<MockTransport>, concurrency: usize) -> ChunkedUploader {
        let config = Arc::new(
            ClientConfig::new("key")
                .with_base_url("http://mock")
                .with_file_upload_concurrency(concurrency)
                .with_retry(RetryConfig::new().with_backoff(Duration::from_millis(1))),
        );
        let executor = RequestExecutor::new(transport, config.retry.clone(), &config.api_key);
        ChunkedUploader::new(executor, config)
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("disk gone")))
        }
    }

    #[tokio::test]
    async fn test_three_chunks() {
        let transport =
            Arc::new(MockTransport::new().route(chunk_path(), |_| Response::empty(200)));
        let mut source = Cursor::new(b"aaaaabbbbbccccc".to_vec());

        uploader(Arc::clone(&transport), 1)
            .upload(&session(15, 5), &mut source, &CancellationToken::new())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);

        let mut uploaded: Vec<(String, Vec<u8>)> = requests
            .iter()
            .map(|r| {
                assert_eq!(r.method, Method::Patch);
                assert_eq!(r.header("Content-Type"), Some("application/octet-stream"));
                (r.header(UPLOAD_OFFSET_HEADER).unwrap().to_string(), r.body.to_vec())
            })
            .collect();
        uploaded.sort();
        assert_eq!(
            uploaded,
            vec![
                ("0".to_string(), b"aaaaa".to_vec()),
                ("10".to_string(), b"ccccc".to_vec()),
                ("5".to_string(), b"bbbbb".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_chunk() {
        let transport =
            Arc::new(MockTransport::new().route(chunk_path(), |_| Response::empty(200)));
        let mut source = Cursor::new(vec![7u8; 15]);

        uploader(Arc::clone(&transport), 4)
            .upload(&session(15, 15), &mut source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.call_count(&chunk_path()), 1);
        assert_eq!(transport.requests()[0].body.len(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_budget() {
        let transport = Arc::new(MockTransport::new().route_async(chunk_path(), |_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Response::empty(200))
        }));
        let mut source = Cursor::new(vec![1u8; 100]);
        let budget = UploadBudget::new(3);

        uploader(Arc::clone(&transport), 3)
            .upload_with_budget(&session(100, 10), &mut source, &budget, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.call_count(&chunk_path()), 10);
        assert_eq!(budget.peak_count(), 3);
        assert_eq!(budget.active_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_stops_dispatch() {
        let transport = Arc::new(MockTransport::new().route(chunk_path(), |request| {
            if request.header(UPLOAD_OFFSET_HEADER) == Some("5") {
                Response::new(500, r#"{"code":50000,"message":"storage unavailable"}"#)
            } else {
                Response::empty(200)
            }
        }));
        let mut source = Cursor::new(vec![0u8; 25]);

        let err = uploader(Arc::clone(&transport), 1)
            .upload(&session(25, 5), &mut source, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.call_count(&chunk_path()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failure_cancels_siblings() {
        let transport = Arc::new(MockTransport::new().route_async(chunk_path(), |request| async move {
            if request.header(UPLOAD_OFFSET_HEADER) == Some("0") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(Response::empty(200));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Response::new(500, r#"{"code":50000,"message":"storage unavailable"}"#))
        }));
        let mut source = Cursor::new(vec![0u8; 25]);
        let budget = UploadBudget::new(3);
        let started = tokio::time::Instant::now();

        let err = uploader(Arc::clone(&transport), 3)
            .upload_with_budget(&session(25, 5), &mut source, &budget, &CancellationToken::new())
            .await
            .unwrap_err();

        // The stalled first chunk was abandoned, not awaited.
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_cancellation());
        // Chunks at offsets 15 and 20 were never dispatched.
        assert_eq!(transport.call_count(&chunk_path()), 3);
        assert_eq!(budget.active_count(), 0);
    }

    #[tokio::test]
    async fn test_source_shorter_than_plan() {
        let transport =
            Arc::new(MockTransport::new().route(chunk_path(), |_| Response::empty(200)));
        let mut source = Cursor::new(vec![9u8; 7]);

        uploader(Arc::clone(&transport), 1)
            .upload(&session(15, 5), &mut source, &CancellationToken::new())
            .await
            .unwrap();

        let lens: Vec<usize> = transport.requests().iter().map(|r| r.body.len()).collect();
        assert_eq!(lens, vec![5, 2]);
    }

    #[tokio::test]
    async fn test_source_is_not_consumed_past_plan() {
        let transport =
            Arc::new(MockTransport::new().route(chunk_path(), |_| Response::empty(200)));
        let mut source = Cursor::new(b"0123456789tail".to_vec());

        uploader(Arc::clone(&transport), 2)
            .upload(&session(10, 4), &mut source, &CancellationToken::new())
            .await
            .unwrap();

        let mut rest = String::new();
        source.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "tail");
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        let mut source = Cursor::new(vec![0u8; 4]);

        let err = uploader(Arc::clone(&transport), 1)
            .upload(&session(4, 0), &mut source, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NightfallError::UnexpectedResponse { .. }));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_content() {
        let transport = Arc::new(MockTransport::new());
        let mut source = Cursor::new(Vec::new());

        uploader(Arc::clone(&transport), 1)
            .upload(&session(0, 5), &mut source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let transport = Arc::new(MockTransport::new());

        let err = uploader(Arc::clone(&transport), 1)
            .upload(&session(10, 5), &mut FailingReader, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NightfallError::Io(_)));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancellation() {
        let transport = Arc::new(MockTransport::new().route_async(chunk_path(), |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Response::empty(200))
        }));
        let mut source = Cursor::new(vec![0u8; 15]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = uploader(Arc::clone(&transport), 1)
            .upload(&session(15, 5), &mut source, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(transport.call_count(&chunk_path()), 1);
    }

    #[test]
    fn test_first_error_wins() {
        let slot = FirstError::default();
        assert!(slot.record(NightfallError::internal("first")));
        assert!(!slot.record(NightfallError::Cancelled));
        assert!(matches!(slot.take(), Some(NightfallError::Internal { .. })));
        assert!(slot.take().is_none());
    }
}
