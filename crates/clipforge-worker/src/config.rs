//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for final, URL-accessible clips
    pub output_dir: PathBuf,
    /// Root for per-job scratch directories
    pub temp_dir: PathBuf,
    /// Comments requested from the downloader per analysis
    pub max_comments: usize,
    /// Transcode deadline per clip
    pub transcode_timeout: Duration,
    /// Subtitle fetch deadline
    pub subtitle_timeout: Duration,
    /// Deadline for one full analysis spawn
    pub analysis_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            temp_dir: PathBuf::from("temp"),
            max_comments: 200,
            transcode_timeout: Duration::from_secs(600),
            subtitle_timeout: Duration::from_secs(30),
            analysis_timeout: Duration::from_secs(180),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables, with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("CLIPFORGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            temp_dir: std::env::var("CLIPFORGE_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            max_comments: env_parse("CLIPFORGE_MAX_COMMENTS", defaults.max_comments),
            transcode_timeout: Duration::from_secs(env_parse(
                "CLIPFORGE_TRANSCODE_TIMEOUT_SECS",
                defaults.transcode_timeout.as_secs(),
            )),
            subtitle_timeout: Duration::from_secs(env_parse(
                "CLIPFORGE_SUBTITLE_TIMEOUT_SECS",
                defaults.subtitle_timeout.as_secs(),
            )),
            analysis_timeout: Duration::from_secs(env_parse(
                "CLIPFORGE_ANALYSIS_TIMEOUT_SECS",
                defaults.analysis_timeout.as_secs(),
            )),
        }
    }

    /// Scratch directory for one job.
    pub fn job_temp_dir(&self, job_id: &clipforge_models::JobId) -> PathBuf {
        self.temp_dir.join(job_id.as_str())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
