//! Silence detection via the transcoder's silencedetect filter.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Default silence floor in dB.
pub const SILENCE_NOISE_DB: f64 = -35.0;

/// Default minimum silence length in seconds.
pub const SILENCE_MIN_DURATION_S: f64 = 0.3;

/// One detected silence interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceSpan {
    pub start_s: f64,
    pub end_s: f64,
}

impl SilenceSpan {
    pub fn duration_s(&self) -> f64 {
        (self.end_s - self.start_s).max(0.0)
    }

    /// Seconds of overlap with `[start_s, end_s)`.
    pub fn overlap_with(&self, start_s: f64, end_s: f64) -> f64 {
        (self.end_s.min(end_s) - self.start_s.max(start_s)).max(0.0)
    }
}

/// Run one silencedetect pass over the input.
pub async fn detect_silences(
    input: impl AsRef<Path>,
    runner: &FfmpegRunner,
) -> MediaResult<Vec<SilenceSpan>> {
    let cmd = FfmpegCommand::analysis(input.as_ref()).output_args([
        "-af",
        &format!(
            "silencedetect=noise={}dB:d={}",
            SILENCE_NOISE_DB, SILENCE_MIN_DURATION_S
        ),
        "-vn",
    ]);

    let capture = runner.run_capture(&cmd).await?;
    let spans = parse_silencedetect(&capture.stderr);
    debug!(spans = spans.len(), "silence detection complete");
    Ok(spans)
}

/// Parse `silence_start` / `silence_end` pairs from silencedetect logs.
pub fn parse_silencedetect(stderr: &str) -> Vec<SilenceSpan> {
    let start_re = Regex::new(r"silence_start:\s*(-?\d+(?:\.\d+)?)").expect("static regex");
    let end_re = Regex::new(r"silence_end:\s*(-?\d+(?:\.\d+)?)").expect("static regex");

    let mut spans = Vec::new();
    let mut pending_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = start_re.captures(line) {
            pending_start = caps[1].parse().ok();
        } else if let Some(caps) = end_re.captures(line) {
            if let (Some(start_s), Ok(end_s)) = (pending_start.take(), caps[1].parse::<f64>()) {
                if end_s > start_s {
                    spans.push(SilenceSpan {
                        start_s: start_s.max(0.0),
                        end_s,
                    });
                }
            }
        }
    }
    spans
}
