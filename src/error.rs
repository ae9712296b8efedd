//! Errors that cross the core boundary.
//!
//! Upstream failures, schema drift, and undecodable images are all absorbed
//! inside the pipeline. Only contract violations reach the caller, and they
//! do so as [`HarnessError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid handle '{handle}': {reason}")]
    InvalidHandle {
        handle: String,
        reason: &'static str,
    },

    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    #[error("media item not found: {0}")]
    MediaNotFound(i64),
}
