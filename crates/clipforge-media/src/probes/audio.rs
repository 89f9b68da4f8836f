//! Audio-energy probe.
//!
//! Primary path: one astats pass producing per-window RMS levels, mapped
//! from dB onto `[0, 1]`. Fallback path: a silencedetect pass, with window
//! intensity derived from its silence coverage. Both paths renormalize the
//! final curve.

use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use clipforge_models::IntensityPoint;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probes::normalize_intensities;
use crate::silence::{detect_silences, SilenceSpan};

/// dB floor mapped to intensity 0.
const DB_FLOOR: f64 = -60.0;

/// dB ceiling mapped to intensity 1.
const DB_CEILING: f64 = -10.0;

/// Resample rate for the analysis pass; with `asetnsamples` this fixes one
/// astats frame per window.
const ANALYSIS_SAMPLE_RATE: u32 = 8000;

/// Measure per-window audio energy; empty on any failure.
pub async fn audio_energy_probe(
    input: &Path,
    duration_s: f64,
    window_s: f64,
    runner: &FfmpegRunner,
) -> Vec<IntensityPoint> {
    match rms_pass(input, duration_s, window_s, runner).await {
        Ok(points) if !points.is_empty() => points,
        Ok(_) => {
            debug!("astats pass produced no measurements, trying silence fallback");
            silence_fallback(input, duration_s, window_s, runner)
                .await
                .unwrap_or_default()
        }
        Err(e) => {
            warn!(error = %e, "audio RMS pass failed, trying silence fallback");
            silence_fallback(input, duration_s, window_s, runner)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "audio probe fallback failed");
                    Vec::new()
                })
        }
    }
}

/// astats pass: fixed-size audio frames, one RMS print per window.
async fn rms_pass(
    input: &Path,
    duration_s: f64,
    window_s: f64,
    runner: &FfmpegRunner,
) -> MediaResult<Vec<IntensityPoint>> {
    let samples_per_window = (ANALYSIS_SAMPLE_RATE as f64 * window_s) as u32;
    let filter = format!(
        "aresample={},asetnsamples=n={},astats=metadata=1:reset=1,\
         ametadata=mode=print:key=lavfi.astats.Overall.RMS_level",
        ANALYSIS_SAMPLE_RATE, samples_per_window
    );

    let cmd = FfmpegCommand::analysis(input).output_args(["-af", &filter, "-vn"]);
    let capture = runner.run_capture(&cmd).await?;

    let mut points = parse_rms_windows(&capture.stderr, duration_s, window_s);
    normalize_intensities(&mut points);
    debug!(windows = points.len(), "audio RMS pass complete");
    Ok(points)
}

/// Parse interleaved `pts_time:` and `RMS_level=` lines into windows.
fn parse_rms_windows(stderr: &str, duration_s: f64, window_s: f64) -> Vec<IntensityPoint> {
    let time_re = Regex::new(r"pts_time:(\d+(?:\.\d+)?)").expect("static regex");
    let rms_re =
        Regex::new(r"lavfi\.astats\.Overall\.RMS_level=(-?\d+(?:\.\d+)?|-?inf)").expect("static regex");

    let mut points = Vec::new();
    let mut current_time: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = time_re.captures(line) {
            current_time = caps[1].parse().ok();
        } else if let Some(caps) = rms_re.captures(line) {
            let Some(start_s) = current_time.take() else {
                continue;
            };
            if duration_s > 0.0 && start_s > duration_s {
                continue;
            }
            let db: f64 = match &caps[1] {
                "-inf" => DB_FLOOR,
                v => v.parse().unwrap_or(DB_FLOOR),
            };
            let clamped = db.clamp(DB_FLOOR, DB_CEILING);
            let intensity = (clamped - DB_FLOOR) / (DB_CEILING - DB_FLOOR);

            let end_s = if duration_s > 0.0 {
                (start_s + window_s).min(duration_s)
            } else {
                start_s + window_s
            };
            if end_s > start_s {
                points.push(IntensityPoint::new(
                    (start_s * 1000.0) as u64,
                    (end_s * 1000.0) as u64,
                    intensity,
                ));
            }
        }
    }
    points
}

/// Fallback: derive energy from silence coverage per window.
async fn silence_fallback(
    input: &Path,
    duration_s: f64,
    window_s: f64,
    runner: &FfmpegRunner,
) -> MediaResult<Vec<IntensityPoint>> {
    let silences = detect_silences(input, runner).await?;
    let mut points = points_from_silences(&silences, duration_s, window_s);
    normalize_intensities(&mut points);
    debug!(windows = points.len(), silences = silences.len(), "audio silence fallback complete");
    Ok(points)
}

/// Intensity per window is `1 - overlap_ratio * 0.9`.
fn points_from_silences(
    silences: &[SilenceSpan],
    duration_s: f64,
    window_s: f64,
) -> Vec<IntensityPoint> {
    if duration_s <= 0.0 {
        return Vec::new();
    }

    let windows = (duration_s / window_s).ceil() as usize;
    (0..windows)
        .map(|i| {
            let start_s = i as f64 * window_s;
            let end_s = ((i + 1) as f64 * window_s).min(duration_s);
            let overlap: f64 = silences.iter().map(|s| s.overlap_with(start_s, end_s)).sum();
            let ratio = (overlap / (end_s - start_s)).clamp(0.0, 1.0);
            IntensityPoint::new(
                (start_s * 1000.0) as u64,
                (end_s * 1000.0) as u64,
                1.0 - ratio * 0.9,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rms_windows() {
        let stderr = "\
[Parsed_ametadata_3 @ 0x1] frame:0 pts:0 pts_time:0\n\
[Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level=-20.5\n\
[Parsed_ametadata_3 @ 0x1] frame:1 pts:16000 pts_time:2\n\
[Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level=-60.0\n\
[Parsed_ametadata_3 @ 0x1] frame:2 pts:32000 pts_time:4\n\
[Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level=-5.0\n";
        let points = parse_rms_windows(stderr, 6.0, 2.0);

        assert_eq!(points.len(), 3);
        // -20.5 dB maps to (−20.5 + 60) / 50 = 0.79
        assert!((points[0].intensity - 0.79).abs() < 1e-9);
        // floor clamps to 0
        assert!((points[1].intensity - 0.0).abs() < 1e-9);
        // above ceiling clamps to 1
        assert!((points[2].intensity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rms_handles_inf() {
        let stderr = "pts_time:0\nlavfi.astats.Overall.RMS_level=-inf\n";
        let points = parse_rms_windows(stderr, 2.0, 2.0);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].intensity, 0.0);
    }

    #[test]
    fn test_silence_coverage_scales_intensity() {
        let silences = [SilenceSpan { start_s: 0.0, end_s: 1.0 }];
        let points = points_from_silences(&silences, 4.0, 2.0);

        assert_eq!(points.len(), 2);
        // Half the first window is silent: 1 - 0.5*0.9 = 0.55
        assert!((points[0].intensity - 0.55).abs() < 1e-9);
        // Second window fully loud
        assert!((points[1].intensity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fully_silent_window_keeps_residual_energy() {
        let silences = [SilenceSpan { start_s: 0.0, end_s: 2.0 }];
        let points = points_from_silences(&silences, 2.0, 2.0);
        assert!((points[0].intensity - 0.1).abs() < 1e-9);
    }
}
