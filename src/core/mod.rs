//! Core types shared by every layer of the client.
//!
//! - [`config`] - Client configuration and validation
//! - [`error`] - Structured error types
//! - [`types`] - Request and response types exchanged with the API

pub mod config;
pub mod error;
pub mod types;

pub use config::{ClientConfig, USER_AGENT};
pub use error::{ApiError, NightfallError, Result};
pub use types::{
    AlertConfig, EmailAlert, ScanFileRequest, ScanFileResponse, ScanPolicy, ScanTextRequest,
    ScanTextResponse, SlackAlert, UploadSession, WebhookAlert,
};
