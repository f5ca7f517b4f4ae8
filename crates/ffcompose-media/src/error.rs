//! Error types for the encode pipeline.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors from command building and process supervision.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg binary `{0}` not found in PATH")]
    FfmpegNotFound(String),

    #[error("invalid job spec: {0}")]
    InvalidSpec(String),

    #[error("failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg failed: {stderr}")]
    EncodeFailed {
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("encode cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an invalid-spec (build) error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec(message.into())
    }

    /// Create a spawn failure error.
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Create an encode failure error from captured stderr.
    pub fn encode_failed(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::EncodeFailed {
            stderr: stderr.into(),
            exit_code,
        }
    }
}
