//! Scans a file on disk against a stored policy.
//!
//! This example shows how to:
//! - Configure the client from the environment
//! - Bound the upload with a deadline
//! - Trigger a file scan and report the outcome
//!
//! Run with:
//! NIGHTFALL_API_KEY=... cargo run --example scan_file -- <path> <policy-uuid>

use std::time::Duration;

use nightfall::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(path), Some(policy_uuid)) = (args.next(), args.next()) else {
        eprintln!("usage: scan_file <path> <policy-uuid>");
        std::process::exit(2);
    };

    let client = NightfallClient::new(
        ClientConfig::from_env()
            .with_file_upload_concurrency(4)
            .with_timeout(Duration::from_secs(300)),
    )?;

    let mut file = tokio::fs::File::open(&path).await?;
    let size = file.metadata().await?.len();
    println!("Scanning {} ({} bytes)", path, size);

    let request = ScanFileRequest::new(size)
        .with_policy_uuid(policy_uuid)
        .with_request_metadata(format!("source={}", path));

    match client.scan_file(&request, &mut file).await {
        Ok(response) => {
            println!("Scan triggered for file {}: {}", response.id, response.message);
            println!("Findings will be delivered to the policy's alert destinations.");
        }
        Err(NightfallError::Api(e)) => {
            eprintln!("API rejected the request: {} (code {})", e, e.code);
            if !e.description.is_empty() {
                eprintln!("  {}", e.description);
            }
            std::process::exit(1);
        }
        Err(e) if e.is_cancellation() => {
            eprintln!("Scan did not finish in time: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
