//! Request execution with rate-limit aware retries.
//!
//! Every API call goes through the [`RequestExecutor`], which classifies the
//! response status, retries `429 Too Many Requests` a bounded number of times
//! and maps every other failure to a single terminal error.

mod request_executor;
mod retry;

pub use request_executor::RequestExecutor;
pub use retry::{RetryConfig, StatusClass, DEFAULT_RATE_LIMIT_BACKOFF, DEFAULT_RETRY_LIMIT};
