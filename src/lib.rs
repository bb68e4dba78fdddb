//! # Nightfall
//!
//! An async client for the Nightfall data-loss-prevention API.
//!
//! ## Overview
//!
//! The client scans content for sensitive data such as credit card numbers,
//! API keys or personal information:
//!
//! - Scan inline text synchronously with [`NightfallClient::scan_text`]
//! - Scan files of any size with [`NightfallClient::scan_file`], which
//!   uploads the content in chunks and triggers an asynchronous scan whose
//!   findings are delivered to the policy's alert destinations
//! - Retry rate-limited requests automatically
//! - Cancel or bound a file scan with a single deadline
//! - Emit structured audit events for every upload step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nightfall::{ClientConfig, NightfallClient, ScanFileRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NightfallClient::new(
//!         ClientConfig::from_env().with_file_upload_concurrency(4),
//!     )?;
//!
//!     let mut file = tokio::fs::File::open("report.pdf").await?;
//!     let size = file.metadata().await?.len();
//!
//!     let request = ScanFileRequest::new(size).with_policy_uuid("my-policy-uuid");
//!     let response = client.scan_file(&request, &mut file).await?;
//!     println!("scan {} triggered: {}", response.id, response.message);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the reqwest transport
//! - `reqwest-transport` - HTTP transport backed by `reqwest`
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Configuration, request and response types, error handling
//! - **Transport**: A single HTTP exchange behind the [`transport::Transport`] trait
//! - **Executor**: Authentication headers, status mapping and rate-limit retries
//! - **Upload**: Chunk planning, bounded concurrent uploads and the upload state machine
//! - **Client**: The public entry point
//! - **Audit**: Structured lifecycle events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod client;
pub mod core;
pub mod executor;
pub mod transport;
pub mod upload;

// Re-export commonly used types at the crate root
pub use crate::client::{NightfallClient, NightfallClientBuilder};
pub use crate::core::{
    AlertConfig, ApiError, ClientConfig, EmailAlert, NightfallError, Result, ScanFileRequest,
    ScanFileResponse, ScanPolicy, ScanTextRequest, ScanTextResponse, SlackAlert, UploadSession,
    WebhookAlert, USER_AGENT,
};
pub use crate::executor::RetryConfig;
pub use crate::upload::{FileScanFlow, UploadState};

/// Re-exported so callers can cancel scans without depending on `tokio-util`.
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports.
///
/// ```rust
/// use nightfall::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{NightfallClient, NightfallClientBuilder};
    pub use crate::core::{
        AlertConfig, ClientConfig, NightfallError, ScanFileRequest, ScanFileResponse, ScanPolicy,
        ScanTextRequest, ScanTextResponse,
    };
    pub use crate::executor::RetryConfig;
    pub use crate::transport::{MockTransport, Transport};
    pub use crate::upload::{FileScanFlow, UploadState};
    pub use tokio_util::sync::CancellationToken;
}
