//! Engine error types.

use thiserror::Error;

/// Errors from artifact storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }
}

/// Errors from webhook delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook delivery to {endpoint} failed after {attempts} attempts: {source}")]
    DeliveryFailed {
        endpoint: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}
