//! Structured audit logging for the upload lifecycle.
//!
//! Every lifecycle step emits a `tracing` event under the
//! `nightfall::audit` target, so a subscriber can route them to a separate
//! sink (JSON file, OpenTelemetry, etc.) with a target filter.

mod events;

pub use events::{
    emit_chunks_uploaded, emit_scan_triggered, emit_text_scanned, emit_upload_failed,
    emit_upload_finalized, emit_upload_initiated, AuditEvent, UploadAuditEvent, AUDIT_TARGET,
};
