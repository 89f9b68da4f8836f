//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised while orchestrating analysis and cut jobs.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Bad request data; never enters the job state machine
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The downloader or transcoder is missing or failed at startup
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// A fatal failure processing one clip; the job continues
    #[error("clip failed: {0}")]
    ClipFailed(String),

    /// A caption/translation/dub enhancement failed; the clip is still
    /// delivered without it
    #[error("enhancement failed: {0}")]
    Enhancement(String),

    /// An external model capability could not be resolved
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("job cancelled")]
    Cancelled,

    #[error(transparent)]
    Media(#[from] clipforge_media::MediaError),

    #[error(transparent)]
    Hub(#[from] clipforge_hub::HubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn clip_failed(msg: impl Into<String>) -> Self {
        Self::ClipFailed(msg.into())
    }

    pub fn enhancement(msg: impl Into<String>) -> Self {
        Self::Enhancement(msg.into())
    }

    /// Whether this error aborts the whole job rather than one clip.
    pub fn is_job_fatal(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}
