//! Job identifiers and progress events.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a cut job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stage of a job's per-clip pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Fetching the clip's source range
    #[default]
    Downloading,
    /// Running reframe analysis
    Analyzing,
    /// Transcoding the clip
    Processing,
    /// Burning captions / translating / dubbing
    Captioning,
    /// All clips finished
    Done,
    /// Job failed or was cancelled
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Downloading => "downloading",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Processing => "processing",
            JobStatus::Captioning => "captioning",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job's progress, pushed to listeners.
///
/// `current_clip` is non-decreasing for a given job; `done` and `error`
/// are terminal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub status: JobStatus,
    /// 1-based index of the clip being processed
    pub current_clip: u32,
    pub total_clips: u32,
    pub message: String,
    /// Produced output filenames, present once clips start completing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Terminal error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When this snapshot was produced
    pub timestamp: DateTime<Utc>,
}

impl JobProgress {
    /// Initial snapshot for a freshly submitted job.
    pub fn queued(total_clips: u32) -> Self {
        Self {
            status: JobStatus::Downloading,
            current_clip: 0,
            total_clips,
            message: "Job accepted".to_string(),
            files: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn stage(
        status: JobStatus,
        current_clip: u32,
        total_clips: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            current_clip,
            total_clips,
            message: message.into(),
            files: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Terminal success snapshot listing the produced files.
    pub fn done(total_clips: u32, files: Vec<String>) -> Self {
        Self {
            status: JobStatus::Done,
            current_clip: total_clips,
            total_clips,
            message: format!("Produced {} clip(s)", files.len()),
            files: Some(files),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Terminal failure snapshot.
    pub fn error(current_clip: u32, total_clips: u32, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: JobStatus::Error,
            current_clip,
            total_clips,
            message: error.clone(),
            files: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
