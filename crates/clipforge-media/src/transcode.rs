//! Final clip transcoding.

use std::path::{Path, PathBuf};

use tracing::info;

use clipforge_models::{CropMode, CropPlan, Quality};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{build_crop_filter, VideoFilter};

/// Audio bitrate for final clips.
const AUDIO_BITRATE: &str = "192k";

/// Audio sample rate for final clips.
const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// One transcode invocation.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Seek into the input, seconds
    pub seek_s: f64,
    pub duration_s: f64,
    pub mode: CropMode,
    /// Reframe plan, only meaningful for smart reframe
    pub plan: Option<CropPlan>,
    pub quality: Quality,
}

/// Transcode one clip into the vertical output format:
/// H.264 High / yuv420p, AAC 192 kbit/s at 44.1 kHz, faststart.
pub async fn transcode_clip(job: &TranscodeJob, runner: &FfmpegRunner) -> MediaResult<()> {
    let (out_w, out_h) = job.quality.output_size();
    let filter = build_crop_filter(job.mode, job.plan.as_ref(), out_w, out_h);

    info!(
        input = %job.input.display(),
        output = %job.output.display(),
        mode = %job.mode,
        seek_s = job.seek_s,
        duration_s = job.duration_s,
        "transcoding clip"
    );

    let mut cmd = FfmpegCommand::new(&job.input, &job.output)
        .seek(job.seek_s)
        .duration(job.duration_s);

    cmd = match filter {
        VideoFilter::Simple(f) => cmd.video_filter(f),
        VideoFilter::Complex(f) => cmd.filter_complex(f),
    };

    let cmd = cmd
        .video_codec("libx264")
        .output_args(["-profile:v", "high", "-pix_fmt", "yuv420p"])
        .preset("medium")
        .crf(job.quality.crf())
        .audio_codec("aac")
        .output_args([
            "-b:a",
            AUDIO_BITRATE,
            "-ar",
            &AUDIO_SAMPLE_RATE.to_string(),
            "-movflags",
            "+faststart",
        ]);

    runner.run(&cmd).await
}

/// Generate a thumbnail JPEG for a produced clip. Non-fatal helper.
pub async fn generate_thumbnail(
    clip: impl AsRef<Path>,
    thumbnail: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(clip.as_ref(), thumbnail.as_ref())
        .seek(1.0)
        .video_filter("scale=480:-2")
        .output_args(["-vframes", "1", "-q:v", "4"]);

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_command_shape() {
        let job = TranscodeJob {
            input: PathBuf::from("seg.mp4"),
            output: PathBuf::from("clip.mp4"),
            seek_s: 3.0,
            duration_s: 40.0,
            mode: CropMode::Center,
            plan: None,
            quality: Quality::Q720,
        };
        let (w, h) = job.quality.output_size();
        let filter = build_crop_filter(job.mode, None, w, h);
        assert!(matches!(filter, VideoFilter::Simple(_)));

        // The command carries the required encode settings
        let cmd = FfmpegCommand::new(&job.input, &job.output)
            .seek(job.seek_s)
            .duration(job.duration_s)
            .video_codec("libx264")
            .output_args(["-profile:v", "high", "-pix_fmt", "yuv420p"])
            .crf(job.quality.crf());
        let args = cmd.build_args();

        assert!(args.contains(&"high".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"20".to_string())); // CRF for 720p
        assert!(args.contains(&"3.000".to_string()));
    }
}
