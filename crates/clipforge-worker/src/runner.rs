//! Job runners: one dedicated worker task per submitted job.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use clipforge_hub::ProgressHub;
use clipforge_models::{
    CaptionPreset, CropMode, JobId, JobProgress, JobStatus, Quality, Segment, SubtitleEntry,
};

use crate::analysis::{analyze_url, AnalyzeSettings};
use crate::capabilities::Capabilities;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{process_clip, ClipContext, JobCaches};

/// Maximum URLs per batch job.
pub const MAX_BATCH_URLS: usize = 20;

/// How translated subtitles are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateMode {
    /// Burn translated captions only
    Captions,
    /// Synthesize translated speech over the original audio
    Dub,
}

/// A cut-job specification, as submitted by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutJobSpec {
    pub url: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub crop_mode: CropMode,
    #[serde(default)]
    pub captions: CaptionPreset,
    pub video_title: String,
    #[serde(default, deserialize_with = "deserialize_quality")]
    pub quality: Quality,
    #[serde(default)]
    pub translate_to: Option<String>,
    #[serde(default)]
    pub translate_mode: Option<TranslateMode>,
    /// Client-edited subtitles keyed by segment id
    #[serde(default)]
    pub edited_subtitles: Option<HashMap<String, Vec<SubtitleEntry>>>,
}

/// Accept quality as a bare integer (1080/720/480) or its string form.
fn deserialize_quality<'de, D>(deserializer: D) -> Result<Quality, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(Quality::from_height(n)),
        Raw::Str(s) => s
            .parse::<u32>()
            .map(Quality::from_height)
            .map_err(|_| serde::de::Error::custom(format!("invalid quality: {}", s))),
    }
}

/// A batch-job specification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobSpec {
    pub urls: Vec<String>,
    #[serde(default)]
    pub settings: AnalyzeSettings,
    #[serde(default)]
    pub crop_mode: CropMode,
    #[serde(default)]
    pub captions: CaptionPreset,
}

/// The job orchestrator: validates specs, allocates job records and runs
/// each job on a dedicated task.
pub struct Worker {
    pub config: WorkerConfig,
    pub hub: Arc<ProgressHub>,
    capabilities: Capabilities,
}

impl Worker {
    pub fn new(config: WorkerConfig, hub: Arc<ProgressHub>) -> Self {
        Self {
            config,
            hub,
            capabilities: Capabilities::new(),
        }
    }

    /// Submit a cut job. The job id returns before any work starts.
    pub async fn submit_cut(self: &Arc<Self>, spec: CutJobSpec) -> WorkerResult<JobId> {
        if spec.segments.is_empty() {
            return Err(WorkerError::invalid_input("no segments selected"));
        }
        if !clipforge_media::is_supported_url(&spec.url) {
            return Err(WorkerError::invalid_input(format!(
                "unsupported URL: {}",
                spec.url
            )));
        }

        let (job_id, cancel) = self.hub.create_job(spec.segments.len() as u32).await;
        let worker = self.clone();
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            worker.run_cut_job(task_job_id, cancel, spec).await;
        });

        Ok(job_id)
    }

    /// Submit a batch of URLs, each analyzed and cut with shared settings.
    pub async fn submit_batch(self: &Arc<Self>, spec: BatchJobSpec) -> WorkerResult<(JobId, usize)> {
        if spec.urls.is_empty() {
            return Err(WorkerError::invalid_input("no URLs given"));
        }
        if spec.urls.len() > MAX_BATCH_URLS {
            return Err(WorkerError::invalid_input(format!(
                "batch size {} exceeds the limit of {}",
                spec.urls.len(),
                MAX_BATCH_URLS
            )));
        }

        let total = spec.urls.len();
        let (job_id, cancel) = self.hub.create_job(total as u32).await;
        let worker = self.clone();
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            worker.run_batch_job(task_job_id, cancel, spec).await;
        });

        Ok((job_id, total))
    }

    /// Dedicated worker loop for one cut job.
    async fn run_cut_job(
        self: Arc<Self>,
        job_id: JobId,
        cancel: watch::Receiver<bool>,
        spec: CutJobSpec,
    ) {
        let temp_dir = self.config.job_temp_dir(&job_id);
        if let Err(e) = tokio::fs::create_dir_all(&temp_dir).await {
            error!(job_id = %job_id, error = %e, "failed to create job temp dir");
            self.publish_error(&job_id, 0, spec.segments.len() as u32, e.to_string())
                .await;
            return;
        }

        let video_id = derive_video_id(&spec.url);
        let total = spec.segments.len() as u32;
        // Caches are job-scoped: reset at submit, cleared at completion
        let mut caches = JobCaches::default();
        let mut files: Vec<String> = Vec::new();
        let mut cancelled = false;

        for (index, segment) in spec.segments.iter().enumerate() {
            if *cancel.borrow() {
                cancelled = true;
                break;
            }

            let ctx = ClipContext {
                config: &self.config,
                hub: &self.hub,
                job_id: &job_id,
                spec: &spec,
                temp_dir: &temp_dir,
                video_id: &video_id,
                cancel: cancel.clone(),
                capabilities: &self.capabilities,
                clip_no: index as u32 + 1,
                total_clips: total,
                message_prefix: "",
            };

            match process_clip(&ctx, index, segment, &mut caches).await {
                Ok(filename) => files.push(filename),
                Err(WorkerError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    // Fatal for this clip only; the job continues
                    warn!(job_id = %job_id, clip = index, error = %e, "clip failed");
                }
            }
        }

        if cancelled {
            info!(job_id = %job_id, "job cancelled, removing in-flight artifacts");
            self.publish_error(&job_id, files.len() as u32, total, "cancelled")
                .await;
        } else {
            self.hub
                .publish(&job_id, JobProgress::done(total, files))
                .await
                .ok();
        }

        // Job-scoped temp artifacts (including the caches) go with the dir
        tokio::fs::remove_dir_all(&temp_dir).await.ok();
        drop(caches);
    }

    /// Dedicated worker loop for a batch job; `currentClip` counts URLs.
    async fn run_batch_job(
        self: Arc<Self>,
        job_id: JobId,
        cancel: watch::Receiver<bool>,
        spec: BatchJobSpec,
    ) {
        let temp_dir = self.config.job_temp_dir(&job_id);
        if let Err(e) = tokio::fs::create_dir_all(&temp_dir).await {
            self.publish_error(&job_id, 0, spec.urls.len() as u32, e.to_string())
                .await;
            return;
        }

        let total = spec.urls.len() as u32;
        let mut files: Vec<String> = Vec::new();
        let mut cancelled = false;

        for (url_index, url) in spec.urls.iter().enumerate() {
            if *cancel.borrow() {
                cancelled = true;
                break;
            }
            let url_no = url_index as u32 + 1;
            let prefix = format!("URL {}/{}: ", url_no, total);

            self.hub
                .publish(
                    &job_id,
                    JobProgress::stage(
                        JobStatus::Analyzing,
                        url_no,
                        total,
                        format!("{}analyzing", prefix),
                    ),
                )
                .await
                .ok();

            let report = match analyze_url(url, &spec.settings, &self.config, Some(cancel.clone()))
                .await
            {
                Ok(report) => report,
                Err(WorkerError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(job_id = %job_id, url = %url, error = %e, "batch URL analysis failed");
                    continue;
                }
            };
            if report.segments.is_empty() {
                warn!(job_id = %job_id, url = %url, "no segments detected, skipping URL");
                continue;
            }

            let cut_spec = CutJobSpec {
                url: url.clone(),
                segments: report.segments,
                crop_mode: spec.crop_mode,
                captions: spec.captions,
                video_title: report.video.title.clone(),
                quality: Quality::default(),
                translate_to: None,
                translate_mode: None,
                edited_subtitles: None,
            };

            let video_id = derive_video_id(url);
            let mut caches = JobCaches::default();
            for (index, segment) in cut_spec.segments.iter().enumerate() {
                if *cancel.borrow() {
                    cancelled = true;
                    break;
                }
                let ctx = ClipContext {
                    config: &self.config,
                    hub: &self.hub,
                    job_id: &job_id,
                    spec: &cut_spec,
                    temp_dir: &temp_dir,
                    video_id: &video_id,
                    cancel: cancel.clone(),
                    capabilities: &self.capabilities,
                    clip_no: url_no,
                    total_clips: total,
                    message_prefix: &prefix,
                };
                match process_clip(&ctx, index, segment, &mut caches).await {
                    Ok(filename) => files.push(filename),
                    Err(WorkerError::Cancelled) => {
                        cancelled = true;
                        break;
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, url = %url, clip = index, error = %e, "batch clip failed");
                    }
                }
            }
            if cancelled {
                break;
            }
        }

        if cancelled {
            self.publish_error(&job_id, files.len() as u32, total, "cancelled")
                .await;
        } else {
            self.hub
                .publish(&job_id, JobProgress::done(total, files))
                .await
                .ok();
        }
        tokio::fs::remove_dir_all(&temp_dir).await.ok();
    }

    async fn publish_error(
        &self,
        job_id: &JobId,
        current_clip: u32,
        total: u32,
        message: impl Into<String>,
    ) {
        self.hub
            .publish(job_id, JobProgress::error(current_clip, total, message))
            .await
            .ok();
    }
}

/// Derive a filesystem-safe video id from a URL.
///
/// Provider ids are used when recognizable; anything else hashes the URL.
pub fn derive_video_id(url: &str) -> String {
    // youtu.be/<id> and watch?v=<id> carry an 11-char token
    let candidate = url
        .split_once("v=")
        .map(|(_, rest)| rest)
        .or_else(|| url.split_once("youtu.be/").map(|(_, rest)| rest))
        .map(|rest| {
            rest.chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        });

    match candidate {
        Some(id) if id.len() == 11 => id,
        _ => {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            url.hash(&mut hasher);
            format!("{:016x}", hasher.finish())
        }
    }
}
