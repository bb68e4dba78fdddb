//! Runs a complete file scan against an in-process mock API.
//!
//! This example shows how to:
//! - Plug a custom transport into the client
//! - Watch the upload move through its states step by step
//! - Observe rate-limit retries
//!
//! Run with: cargo run --example mock_scan

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nightfall::prelude::*;
use nightfall::transport::Response;

const SESSION_ID: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let content = b"name: Jane Doe\nssn: 078-05-1120\ncard: 4242-4242-4242-4242\n".to_vec();
    let size = content.len() as u64;

    // The first initiate call is rate limited, the second succeeds.
    let initiate_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&initiate_calls);

    let transport = Arc::new(
        MockTransport::new()
            .route("/v3/upload", move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Response::empty(429);
                }
                Response::json(
                    200,
                    &serde_json::json!({
                        "id": SESSION_ID,
                        "fileSizeBytes": size,
                        "chunkSize": 16,
                    }),
                )
            })
            .route(format!("/v3/upload/{}", SESSION_ID), |_| Response::empty(200))
            .route(format!("/v3/upload/{}/finish", SESSION_ID), |_| {
                Response::empty(200)
            })
            .route(format!("/v3/upload/{}/scan", SESSION_ID), |_| {
                Response::json(
                    200,
                    &serde_json::json!({"id": SESSION_ID, "message": "scan initiated"}),
                )
            }),
    );

    let client = NightfallClient::builder()
        .with_config(
            ClientConfig::new("demo-key")
                .with_base_url("http://mock")
                .with_file_upload_concurrency(2)
                .with_retry(RetryConfig::new().with_backoff(Duration::from_millis(100))),
        )
        .with_arc_transport(transport.clone())
        .build()?;

    let request = ScanFileRequest::new(size).with_policy(
        ScanPolicy::default()
            .with_detection_rule_uuid("credit-card-rule")
            .with_alert_config(AlertConfig::default().with_email("security@example.com")),
    );
    let cancel = CancellationToken::new();
    let mut source = Cursor::new(content);

    let mut flow = client.begin_file_scan();
    println!("state: {}", flow.state());

    let session = flow.initiate(size, &cancel).await?.clone();
    println!("state: {} (chunks: {})", flow.state(), session.chunk_count());

    flow.upload(&mut source, &cancel).await?;
    println!("state: {}", flow.state());

    flow.finalize(&cancel).await?;
    println!("state: {}", flow.state());

    let response = flow.trigger_processing(&request, &cancel).await?;
    println!("state: {} ({})", flow.state(), response.message);

    println!(
        "\n{} requests sent, {} initiate attempts",
        transport.total_calls(),
        initiate_calls.load(Ordering::SeqCst)
    );

    Ok(())
}
