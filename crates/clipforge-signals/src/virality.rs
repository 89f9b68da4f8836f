//! Weighted virality scoring for selected segments.

use clipforge_models::{CombinedHeatmap, Segment, ViralityBreakdown};

/// Hook window length, seconds.
const HOOK_WINDOW_S: f64 = 3.0;

/// Score one segment against the heatmap it was detected in.
///
/// Produces six 0..100 sub-scores and their weighted combination:
/// peak 0.30, hook 0.25, pacing 0.15, audio 0.15, position 0.10,
/// duration fit 0.05.
pub fn score_segment(
    segment: &Segment,
    heatmap: &CombinedHeatmap,
    video_duration_s: f64,
) -> ViralityBreakdown {
    let peak = (100.0 * segment.peak_intensity).round().clamp(0.0, 100.0) as u32;
    let hook = hook_strength(segment, heatmap);
    let pacing = pacing_score(segment, heatmap);
    let audio = (100.0 * segment.avg_intensity).round().clamp(0.0, 100.0) as u32;
    let position = position_bonus(segment.start_s, video_duration_s);
    let duration = duration_fit(segment.duration_s);

    ViralityBreakdown::from_sub_scores(peak, hook, pacing, audio, position, duration)
}

/// Energy of the first three seconds relative to the segment average.
///
/// A hook hotter than the segment average earns a retention bonus; with no
/// heatmap coverage of the hook window the score degrades to half the
/// average energy.
fn hook_strength(segment: &Segment, heatmap: &CombinedHeatmap) -> u32 {
    let window = heatmap.intensities_in(segment.start_s, segment.start_s + HOOK_WINDOW_S);
    if window.is_empty() {
        return (50.0 * segment.avg_intensity).round().clamp(0.0, 100.0) as u32;
    }

    let h = window.iter().sum::<f64>() / window.len() as f64;
    let bonus = if h > segment.avg_intensity { 15.0 } else { 0.0 };
    (85.0 * h + bonus).min(100.0).round() as u32
}

/// Intensity variance across the segment, read as pacing.
fn pacing_score(segment: &Segment, heatmap: &CombinedHeatmap) -> u32 {
    let intensities = heatmap.intensities_in(segment.start_s, segment.end_s);
    if intensities.len() < 3 {
        return 50;
    }

    let mean = intensities.iter().sum::<f64>() / intensities.len() as f64;
    let variance = intensities.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / intensities.len() as f64;
    (400.0 * variance.sqrt()).min(100.0).round() as u32
}

/// Earlier segments score higher: 100→80 across the first third,
/// 80→50 across the middle, 50→30 across the last.
fn position_bonus(start_s: f64, video_duration_s: f64) -> u32 {
    if video_duration_s <= 0.0 {
        return 50;
    }
    let frac = (start_s / video_duration_s).clamp(0.0, 1.0);

    let score = if frac < 1.0 / 3.0 {
        100.0 - 60.0 * frac
    } else if frac < 2.0 / 3.0 {
        80.0 - 90.0 * (frac - 1.0 / 3.0)
    } else {
        50.0 - 60.0 * (frac - 2.0 / 3.0)
    };
    score.round().clamp(0.0, 100.0) as u32
}

/// Fit of the duration to the short-form sweet spot of 30–45 s.
fn duration_fit(duration_s: f64) -> u32 {
    let score = if (30.0..=45.0).contains(&duration_s) {
        100.0
    } else if (20.0..30.0).contains(&duration_s) {
        70.0 + 3.0 * (duration_s - 20.0)
    } else if (45.0..=60.0).contains(&duration_s) {
        100.0 - 2.0 * (duration_s - 45.0)
    } else if (15.0..20.0).contains(&duration_s) {
        50.0
    } else {
        30.0
    };
    score.round() as u32
}
