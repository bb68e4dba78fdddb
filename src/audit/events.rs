//! Audit event types and emission functions.

use crate::core::{NightfallError, ScanFileResponse, ScanTextResponse, UploadSession};
use crate::upload::UploadState;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracing target of every audit event.
pub const AUDIT_TARGET: &str = "nightfall::audit";

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &str;
}

/// Audit record of one upload lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAuditEvent {
    /// Event type.
    pub event_type: String,

    /// Upload session ID, once the session exists.
    pub session_id: Option<Uuid>,

    /// State the upload was in when the event happened.
    pub state: String,

    /// Declared content size, if known.
    pub file_size_bytes: Option<u64>,

    /// Number of planned chunks, if known.
    pub chunk_count: Option<u64>,

    /// Error message for failures.
    pub error: Option<String>,
}

impl UploadAuditEvent {
    /// Builds the event for a newly created session.
    pub fn initiated(session: &UploadSession) -> Self {
        Self {
            event_type: "upload_initiated".to_string(),
            session_id: Some(session.id),
            state: UploadState::Initiated.to_string(),
            file_size_bytes: Some(session.file_size_bytes),
            chunk_count: Some(session.chunk_count()),
            error: None,
        }
    }

    /// Builds the event for a failed step.
    pub fn failed(session_id: Option<&Uuid>, state: UploadState, error: &NightfallError) -> Self {
        Self {
            event_type: "upload_failed".to_string(),
            session_id: session_id.copied(),
            state: state.to_string(),
            file_size_bytes: None,
            chunk_count: None,
            error: Some(error.to_string()),
        }
    }
}

impl AuditEvent for UploadAuditEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// Emits an audit event for a created upload session.
pub fn emit_upload_initiated(session: &UploadSession) {
    let event = UploadAuditEvent::initiated(session);
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = event.event_type(),
        session_id = ?event.session_id,
        state = %event.state,
        file_size_bytes = ?event.file_size_bytes,
        chunk_size = session.chunk_size,
        chunk_count = ?event.chunk_count,
        mime_type = ?session.mime_type,
        "Upload session initiated"
    );
}

/// Emits an audit event once every chunk has been accepted.
pub fn emit_chunks_uploaded(session: &UploadSession) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "chunks_uploaded",
        session_id = %session.id,
        chunk_count = session.chunk_count(),
        "Upload content transferred"
    );
}

/// Emits an audit event for a finalized upload.
pub fn emit_upload_finalized(session_id: &Uuid) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "upload_finalized",
        session_id = %session_id,
        "Upload finalized"
    );
}

/// Emits an audit event for a triggered file scan.
pub fn emit_scan_triggered(session_id: &Uuid, response: &ScanFileResponse) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "scan_triggered",
        session_id = %session_id,
        file_id = %response.id,
        message = %response.message,
        "File scan triggered"
    );
}

/// Emits an audit event for a failed upload step.
pub fn emit_upload_failed(session_id: Option<&Uuid>, state: UploadState, error: &NightfallError) {
    let event = UploadAuditEvent::failed(session_id, state, error);
    tracing::warn!(
        target: AUDIT_TARGET,
        event_type = event.event_type(),
        session_id = ?event.session_id,
        state = %event.state,
        status = ?error.status(),
        cancelled = error.is_cancellation(),
        error = ?event.error,
        "Upload failed"
    );
}

/// Emits an audit event for a synchronous text scan.
pub fn emit_text_scanned(payload_count: usize, response: &ScanTextResponse) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "text_scanned",
        payload_count = payload_count,
        finding_count = response.finding_count(),
        "Text scanned"
    );
}
