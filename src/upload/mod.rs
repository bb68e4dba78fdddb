//! Resumable file uploads.
//!
//! A file scan moves through four API calls:
//!
//! 1. **Initiate** - the API creates a session and picks the chunk size.
//! 2. **Upload** - the content is sent chunk by chunk, concurrently.
//! 3. **Finalize** - the API is told the content is complete.
//! 4. **Scan** - processing of the uploaded file is triggered.
//!
//! [`FileScanFlow`] drives the sequence, [`ChunkedUploader`] owns step 2,
//! [`ChunkPlan`] decides the chunk boundaries and [`UploadBudget`] bounds
//! how many chunks are in flight.

mod budget;
mod orchestrator;
mod plan;
mod session;

pub use budget::{BudgetPermit, UploadBudget};
pub use orchestrator::{ChunkedUploader, UPLOAD_OFFSET_HEADER};
pub use plan::{ChunkPlan, ChunkRange};
pub use session::{FileScanFlow, UploadState};

/// API paths, relative to the base URL.
pub(crate) mod paths {
    use uuid::Uuid;

    pub const INITIATE: &str = "v3/upload";
    pub const SCAN_TEXT: &str = "v3/scan";

    pub fn chunk(id: &Uuid) -> String {
        format!("v3/upload/{}", id)
    }

    pub fn finish(id: &Uuid) -> String {
        format!("v3/upload/{}/finish", id)
    }

    pub fn scan(id: &Uuid) -> String {
        format!("v3/upload/{}/scan", id)
    }
}
