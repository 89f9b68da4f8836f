//! Scene-change probe.
//!
//! One transcoder pass with scene-change detection at threshold 0.3.
//! Long inputs are downsampled and given a larger (but still bounded)
//! deadline; a timed-out pass keeps the events seen so far.

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use clipforge_models::IntensityPoint;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::probes::normalize_intensities;

/// Scene-change detection threshold.
const SCENE_THRESHOLD: f64 = 0.3;

/// Analysis frame width.
const ANALYSIS_WIDTH: u32 = 640;

/// Length classes: (min duration s, fps cap, deadline s).
fn length_class(duration_s: f64) -> (Option<u32>, u64) {
    if duration_s > 7200.0 {
        (Some(1), 180)
    } else if duration_s > 1800.0 {
        (Some(2), 120)
    } else {
        (None, 90)
    }
}

/// Count scene changes per window; empty on any failure.
pub async fn scene_change_probe(
    input: &Path,
    duration_s: f64,
    window_s: f64,
    runner: FfmpegRunner,
) -> Vec<IntensityPoint> {
    let (fps_cap, deadline_s) = length_class(duration_s);

    let mut filter = String::new();
    if let Some(fps) = fps_cap {
        filter.push_str(&format!("fps={},", fps));
    }
    filter.push_str(&format!(
        "scale={}:-2,select='gt(scene,{})',showinfo",
        ANALYSIS_WIDTH, SCENE_THRESHOLD
    ));

    let cmd = FfmpegCommand::analysis(input).output_args(["-vf", &filter, "-an"]);
    let runner = runner.with_timeout(Duration::from_secs(deadline_s));

    let capture = match runner.run_capture(&cmd).await {
        Ok(capture) => capture,
        Err(e) => {
            warn!(error = %e, "scene probe failed");
            return Vec::new();
        }
    };
    if capture.timed_out {
        debug!("scene probe hit its deadline, using partial events");
    }

    let events = parse_scene_events(&capture.stderr);
    let mut points = bucket_events(&events, duration_s, window_s);
    normalize_intensities(&mut points);
    debug!(events = events.len(), windows = points.len(), "scene probe complete");
    points
}

/// Extract event timestamps from showinfo logs.
fn parse_scene_events(stderr: &str) -> Vec<f64> {
    let re = Regex::new(r"pts_time:\s*(\d+(?:\.\d+)?)").expect("static regex");
    stderr
        .lines()
        .filter(|l| l.contains("Parsed_showinfo"))
        .filter_map(|l| re.captures(l).and_then(|c| c[1].parse().ok()))
        .collect()
}

/// Aggregate event timestamps into per-window counts.
fn bucket_events(events: &[f64], duration_s: f64, window_s: f64) -> Vec<IntensityPoint> {
    if duration_s <= 0.0 || events.is_empty() {
        return Vec::new();
    }

    let windows = (duration_s / window_s).ceil() as usize;
    let mut counts = vec![0u32; windows];
    for &t in events {
        let idx = (t / window_s) as usize;
        if idx < windows {
            counts[idx] += 1;
        }
    }

    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let start_s = i as f64 * window_s;
            let end_s = ((i + 1) as f64 * window_s).min(duration_s);
            IntensityPoint::new(
                (start_s * 1000.0) as u64,
                (end_s * 1000.0) as u64,
                count as f64,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_classes() {
        assert_eq!(length_class(600.0), (None, 90));
        assert_eq!(length_class(3600.0), (Some(2), 120));
        assert_eq!(length_class(8000.0), (Some(1), 180));
    }

    #[test]
    fn test_parse_scene_events() {
        let stderr = "\
[Parsed_showinfo_2 @ 0x5] n:   0 pts:  45045 pts_time:4.504   fmt:yuv420p\n\
[Parsed_showinfo_2 @ 0x5] n:   1 pts:  90090 pts_time:9.009   fmt:yuv420p\n\
unrelated pts_time:99.0 line\n";
        let events = parse_scene_events(stderr);
        assert_eq!(events.len(), 2);
        assert!((events[0] - 4.504).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_counts_normalize() {
        let events = [1.0, 1.5, 1.9, 5.0];
        let mut points = bucket_events(&events, 8.0, 2.0);
        normalize_intensities(&mut points);

        assert_eq!(points.len(), 4);
        assert!((points[0].intensity - 1.0).abs() < 1e-9); // 3 events
        assert!((points[2].intensity - (1.0 / 3.0)).abs() < 1e-9); // 1 event
        assert_eq!(points[1].intensity, 0.0);
    }

    #[test]
    fn test_no_events_yields_empty() {
        assert!(bucket_events(&[], 100.0, 2.0).is_empty());
    }
}
