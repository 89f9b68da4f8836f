//! The per-clip pipeline: partial fetch → optional reframe analysis →
//! transcode → optional captions / translation / dubbing.
//!
//! Fetch and transcode failures are fatal for the clip; enhancement
//! failures degrade to an unenhanced clip with a recorded warning.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{info, warn};

use clipforge_hub::ProgressHub;
use clipforge_media::{
    analyze_reframe, burn_captions, download_section, download_video, fetch_subtitles,
    generate_thumbnail, mix_dub, probe_media, render_ass, transcode_clip, verify_audio_track,
    DubCue, FfmpegRunner, MediaError, TranscodeJob,
};
use clipforge_models::captions::slice_subtitles;
use clipforge_models::{
    format_clock, output_filename, CropPlan, JobId, JobProgress, JobStatus, Segment, SubtitleEntry,
};

use crate::capabilities::Capabilities;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::runner::{CutJobSpec, TranslateMode};

/// Seconds fetched before and after the segment bounds.
const FETCH_BUFFER_S: f64 = 3.0;

/// One-shot caches scoped to a job and cleared at its completion.
#[derive(Default)]
pub struct JobCaches {
    /// Full-video fallback artifact
    pub full_video: Option<PathBuf>,
    /// Full-video subtitles for the URL
    pub subtitles: Option<Vec<SubtitleEntry>>,
}

/// Everything a clip run needs from its surrounding job.
pub struct ClipContext<'a> {
    pub config: &'a WorkerConfig,
    pub hub: &'a ProgressHub,
    pub job_id: &'a JobId,
    pub spec: &'a CutJobSpec,
    pub temp_dir: &'a Path,
    pub video_id: &'a str,
    pub cancel: watch::Receiver<bool>,
    pub capabilities: &'a Capabilities,
    /// Progress clip counter value for this clip's events
    pub clip_no: u32,
    pub total_clips: u32,
    /// Prefix for progress messages (used by batch jobs)
    pub message_prefix: &'a str,
}

impl ClipContext<'_> {
    fn ensure_live(&self) -> WorkerResult<()> {
        if *self.cancel.borrow() {
            Err(WorkerError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn publish(&self, status: JobStatus, message: String) {
        let progress = JobProgress::stage(
            status,
            self.clip_no,
            self.total_clips,
            format!("{}{}", self.message_prefix, message),
        );
        self.hub.publish(self.job_id, progress).await.ok();
    }

    fn runner(&self) -> FfmpegRunner {
        FfmpegRunner::new()
            .with_cancel(self.cancel.clone())
            .with_timeout(self.config.transcode_timeout)
    }
}

/// Process one segment into a finished output clip.
///
/// Returns the output filename on success.
pub async fn process_clip(
    ctx: &ClipContext<'_>,
    index: usize,
    segment: &Segment,
    caches: &mut JobCaches,
) -> WorkerResult<String> {
    ctx.ensure_live()?;

    // S1: fetch the source range
    let fetched = fetch_clip_source(ctx, index, segment, caches).await?;
    let clip_duration = segment.end_s - segment.start_s;

    // S2: reframe analysis (optional, non-fatal)
    let plan = if ctx.spec.crop_mode.needs_reframe_analysis() {
        ctx.ensure_live()?;
        ctx.publish(
            JobStatus::Analyzing,
            format!("Analyzing framing for clip {}/{}", index + 1, ctx.total_clips),
        )
        .await;
        run_reframe_analysis(ctx, &fetched, clip_duration).await
    } else {
        None
    };

    // S3: transcode
    ctx.ensure_live()?;
    ctx.publish(
        JobStatus::Processing,
        format!("Processing clip {}/{}", index + 1, ctx.total_clips),
    )
    .await;

    let clip_path = ctx.temp_dir.join(format!("clip_{}.mp4", index));
    let job = TranscodeJob {
        input: fetched.path.clone(),
        output: clip_path.clone(),
        seek_s: fetched.offset_s,
        duration_s: clip_duration,
        mode: ctx.spec.crop_mode,
        plan,
        quality: ctx.spec.quality,
    };
    transcode_clip(&job, &ctx.runner()).await.map_err(fatal)?;

    // S4: captions / translation / dubbing (optional, non-fatal)
    let wants_captions = ctx.spec.captions.style().is_some();
    let wants_translation = ctx.spec.translate_to.is_some();
    let final_path = if wants_captions || wants_translation {
        ctx.ensure_live()?;
        ctx.publish(
            JobStatus::Captioning,
            format!("Captioning clip {}/{}", index + 1, ctx.total_clips),
        )
        .await;

        match enhance_clip(ctx, index, segment, &clip_path, caches).await {
            Ok(path) => path,
            Err(WorkerError::Cancelled) => return Err(WorkerError::Cancelled),
            Err(e) => {
                warn!(job_id = %ctx.job_id, clip = index, error = %e, "enhancement failed, delivering plain clip");
                ctx.publish(
                    JobStatus::Captioning,
                    format!("Captioning failed for clip {}, delivering without it", index + 1),
                )
                .await;
                clip_path.clone()
            }
        }
    } else {
        clip_path.clone()
    };

    // Finalize into the output directory
    let filename = output_filename(&ctx.spec.video_title, index, segment.start_s);
    let output_path = ctx.config.output_dir.join(&filename);
    tokio::fs::create_dir_all(&ctx.config.output_dir).await?;
    tokio::fs::copy(&final_path, &output_path).await?;

    let thumb = output_path.with_extension("jpg");
    if let Err(e) = generate_thumbnail(&output_path, &thumb).await {
        warn!(error = %e, "thumbnail generation failed");
    }

    info!(job_id = %ctx.job_id, clip = index, file = %filename, "clip finished");
    Ok(filename)
}

/// Fetched source artifact for one clip.
struct FetchedSource {
    path: PathBuf,
    /// Seek offset of the segment start inside the artifact
    offset_s: f64,
}

/// S1: partial fetch with full-download fallback and audio verification.
async fn fetch_clip_source(
    ctx: &ClipContext<'_>,
    index: usize,
    segment: &Segment,
    caches: &mut JobCaches,
) -> WorkerResult<FetchedSource> {
    let buffered_start = (segment.start_s - FETCH_BUFFER_S).max(0.0);
    let fetch_end = segment.end_s + FETCH_BUFFER_S;

    ctx.publish(
        JobStatus::Downloading,
        format!(
            "Downloading clip {}/{}: {} → {}",
            index + 1,
            ctx.total_clips,
            format_clock(segment.start_s),
            format_clock(segment.end_s),
        ),
    )
    .await;

    let section_path = ctx
        .temp_dir
        .join(format!("segment_{}_{}.mp4", index, ctx.video_id));

    let partial = download_section(
        &ctx.spec.url,
        buffered_start,
        fetch_end,
        ctx.spec.quality,
        &section_path,
        Some(ctx.cancel.clone()),
    )
    .await;

    match partial {
        Ok(()) => match verify_audio_track(&section_path).await {
            Ok(()) => {
                return Ok(FetchedSource {
                    path: section_path,
                    offset_s: segment.start_s - buffered_start,
                });
            }
            Err(MediaError::MissingAudio(_)) => {
                warn!(clip = index, "partial fetch lacks audio, falling back to full download");
                tokio::fs::remove_file(&section_path).await.ok();
            }
            Err(e) => return Err(fatal(e)),
        },
        Err(MediaError::PartialFetchUnsupported(reason)) => {
            info!(clip = index, reason = %reason, "partial fetch unsupported, using full download");
        }
        Err(MediaError::Cancelled) => return Err(WorkerError::Cancelled),
        Err(e) => return Err(fatal(e)),
    }

    // Full-download fallback, cached per job
    if caches.full_video.is_none() {
        let full_path = ctx.temp_dir.join(format!("full_{}.mp4", ctx.video_id));
        download_video(
            &ctx.spec.url,
            ctx.spec.quality,
            &full_path,
            Some(ctx.cancel.clone()),
        )
        .await
        .map_err(fatal)?;
        verify_audio_track(&full_path).await.map_err(fatal)?;
        caches.full_video = Some(full_path);
    }

    Ok(FetchedSource {
        path: caches.full_video.clone().expect("cache just filled"),
        offset_s: segment.start_s,
    })
}

/// S2: reframe analysis; `None` means fall back to a centered crop.
async fn run_reframe_analysis(
    ctx: &ClipContext<'_>,
    fetched: &FetchedSource,
    clip_duration: f64,
) -> Option<CropPlan> {
    let info = match probe_media(&fetched.path).await {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, "probe before reframe analysis failed");
            return None;
        }
    };

    match analyze_reframe(
        &fetched.path,
        fetched.offset_s,
        clip_duration,
        info.width,
        info.height,
        ctx.temp_dir,
        &ctx.runner(),
    )
    .await
    {
        Ok(plan) => Some(plan),
        Err(e) => {
            warn!(error = %e, "reframe analysis failed, using center crop");
            None
        }
    }
}

/// S4: subtitles → optional translation → caption burn and/or dub mix.
async fn enhance_clip(
    ctx: &ClipContext<'_>,
    index: usize,
    segment: &Segment,
    clip_path: &Path,
    caches: &mut JobCaches,
) -> WorkerResult<PathBuf> {
    let mut entries = obtain_subtitles(ctx, index, segment, clip_path, caches).await?;
    if entries.is_empty() {
        return Err(WorkerError::enhancement("no subtitles available for clip"));
    }

    if let Some(lang) = &ctx.spec.translate_to {
        let translator = ctx.capabilities.translator().await?;
        entries = translator.translate(&entries, lang).await?;
    }

    let mut current = clip_path.to_path_buf();

    if let Some(style) = ctx.spec.captions.style() {
        let (out_w, out_h) = ctx.spec.quality.output_size();
        let ass = render_ass(&entries, &style, out_w, out_h);
        let ass_path = ctx.temp_dir.join(format!("captions_{}.ass", index));
        tokio::fs::write(&ass_path, ass).await?;

        let burned = ctx.temp_dir.join(format!("clip_{}_cap.mp4", index));
        burn_captions(&current, &burned, &ass_path, ctx.spec.quality.crf(), &ctx.runner())
            .await
            .map_err(enhancement)?;
        current = burned;
    }

    if ctx.spec.translate_mode == Some(TranslateMode::Dub) {
        let lang = ctx
            .spec
            .translate_to
            .as_deref()
            .ok_or_else(|| WorkerError::enhancement("dub requested without target language"))?;
        let synthesizer = ctx.capabilities.synthesizer().await?;

        let mut cues = Vec::with_capacity(entries.len());
        for (j, entry) in entries.iter().enumerate() {
            ctx.ensure_live()?;
            let wav = ctx.temp_dir.join(format!("dub_{}_{}.wav", index, j));
            synthesizer.synthesize(&entry.text, lang, &wav).await?;
            cues.push(DubCue {
                audio: wav,
                start_s: entry.start_s,
            });
        }

        let dubbed = ctx.temp_dir.join(format!("clip_{}_dub.mp4", index));
        mix_dub(&current, &dubbed, &cues, &ctx.runner())
            .await
            .map_err(enhancement)?;
        current = dubbed;
    }

    Ok(current)
}

/// Subtitle preference order: client edits, cached full-video subtitles
/// sliced to the segment, then local transcription of the clip audio.
async fn obtain_subtitles(
    ctx: &ClipContext<'_>,
    index: usize,
    segment: &Segment,
    clip_path: &Path,
    caches: &mut JobCaches,
) -> WorkerResult<Vec<SubtitleEntry>> {
    if let Some(edited) = &ctx.spec.edited_subtitles {
        if let Some(entries) = edited.get(segment.id.as_str()) {
            info!(clip = index, "using client-edited subtitles");
            return Ok(entries.clone());
        }
    }

    if caches.subtitles.is_none() {
        let subs_dir = ctx.temp_dir.join("subs");
        let fetched = fetch_subtitles(&ctx.spec.url, &subs_dir, Some(ctx.cancel.clone()))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "full-video subtitle fetch failed");
                Vec::new()
            });
        caches.subtitles = Some(fetched);
    }

    let full = caches.subtitles.as_ref().expect("cache just filled");
    let sliced = slice_subtitles(full, segment.start_s, segment.end_s);
    if !sliced.is_empty() {
        return Ok(sliced);
    }

    // Local transcription of the clip's own audio
    info!(clip = index, "no cached subtitles cover the clip, transcribing locally");
    let transcriber = ctx.capabilities.transcriber().await?;
    transcriber.transcribe(clip_path).await
}

/// Map a media error into a clip-fatal worker error, keeping cancellation.
fn fatal(e: MediaError) -> WorkerError {
    match e {
        MediaError::Cancelled => WorkerError::Cancelled,
        other => WorkerError::clip_failed(other.to_string()),
    }
}

/// Map a media error into a non-fatal enhancement error.
fn enhancement(e: MediaError) -> WorkerError {
    match e {
        MediaError::Cancelled => WorkerError::Cancelled,
        other => WorkerError::enhancement(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_buffer_clamps_at_zero() {
        let start: f64 = 1.5;
        assert_eq!((start - FETCH_BUFFER_S).max(0.0), 0.0);
    }

    #[test]
    fn test_fatal_preserves_cancellation() {
        assert!(matches!(fatal(MediaError::Cancelled), WorkerError::Cancelled));
        assert!(matches!(
            fatal(MediaError::download_failed("x")),
            WorkerError::ClipFailed(_)
        ));
        assert!(matches!(
            enhancement(MediaError::Timeout(30)),
            WorkerError::Enhancement(_)
        ));
    }
}
