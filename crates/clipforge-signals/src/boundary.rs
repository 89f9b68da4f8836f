//! Boundary optimization: snap detected segments to natural sentence and
//! scene edges, and score the opening hook.

use tracing::debug;

use clipforge_models::{BoundaryKind, CombinedHeatmap, Segment};

/// How far before the detected start the search may reach, seconds.
const START_SEARCH_BACK_S: f64 = 5.0;

/// How far after the detected start the search may reach, seconds.
const START_SEARCH_FWD_S: f64 = 2.0;

/// Hook window length, seconds.
const HOOK_WINDOW_S: f64 = 3.0;

/// A detected silence interval in the source audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceInterval {
    pub start_s: f64,
    pub end_s: f64,
}

/// Duration bounds carried over from detection.
#[derive(Debug, Clone)]
pub struct BoundaryOptions {
    pub min_duration_s: f64,
    pub max_duration_s: f64,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            min_duration_s: 15.0,
            max_duration_s: 60.0,
        }
    }
}

/// Optimize every segment's boundaries independently, then verify the
/// result set is still non-overlapping; a conflicting segment falls back
/// to its detector bounds.
pub fn optimize_boundaries(
    segments: Vec<Segment>,
    heatmap: &CombinedHeatmap,
    silences: &[SilenceInterval],
    duration_s: f64,
    opts: &BoundaryOptions,
) -> Vec<Segment> {
    let originals = segments.clone();
    let mut optimized: Vec<Segment> = segments
        .into_iter()
        .map(|seg| optimize_one(seg, heatmap, silences, duration_s, opts))
        .collect();

    enforce_non_overlap(&mut optimized, &originals);
    optimized
}

fn optimize_one(
    seg: Segment,
    heatmap: &CombinedHeatmap,
    silences: &[SilenceInterval],
    duration_s: f64,
    opts: &BoundaryOptions,
) -> Segment {
    let orig_start = seg.start_s;
    let (best_start, boundary) = find_start(&seg, heatmap, silences, duration_s);
    let best_end = find_end(best_start, &seg, heatmap, silences, duration_s, opts);

    // Clamp the final duration; shift the start back if the clip would run
    // past the end of the video.
    let mut start = best_start;
    let mut end = best_end;
    let clamped = (end - start).clamp(opts.min_duration_s, opts.max_duration_s);
    end = start + clamped;
    if end > duration_s {
        end = duration_s;
        start = (end - clamped).max(0.0);
    }

    let hook_score = (100.0 * heatmap.energy(start, start + HOOK_WINDOW_S)).round() as u32;
    let hook_shift_s = ((start - orig_start) * 10.0).round() / 10.0;

    debug!(
        orig_start = orig_start,
        start = start,
        end = end,
        boundary = ?boundary,
        hook_score = hook_score,
        "optimized segment boundary"
    );

    Segment {
        start_s: start,
        end_s: end,
        duration_s: end - start,
        boundary,
        hook_score,
        hook_shift_s,
        ..seg
    }
    .rounded()
}

/// Score every start candidate in the search window and pick the best.
fn find_start(
    seg: &Segment,
    heatmap: &CombinedHeatmap,
    silences: &[SilenceInterval],
    duration_s: f64,
) -> (f64, BoundaryKind) {
    let lo = (seg.start_s - START_SEARCH_BACK_S).max(0.0);
    let hi = (seg.start_s + START_SEARCH_FWD_S).min(duration_s);

    // The original boundary competes without a bonus, so any usable
    // sentence or energy boundary wins over it.
    let mut best = (
        seg.start_s,
        BoundaryKind::Original,
        100.0 * heatmap.energy(seg.start_s, seg.start_s + HOOK_WINDOW_S),
    );

    // Prefer the end of a silence interval: a sentence is about to start
    for silence in silences {
        let cand = silence.end_s;
        if cand < lo || cand > hi {
            continue;
        }
        let score = 100.0 * heatmap.energy(cand, cand + HOOK_WINDOW_S) + 20.0;
        if score > best.2 {
            best = (cand, BoundaryKind::SentenceStart, score);
        }
    }

    // Otherwise a high-energy point makes a strong cold open
    for point in &heatmap.points {
        let cand = point.start_s();
        if cand < lo || cand > hi || point.intensity <= 0.5 {
            continue;
        }
        let score =
            100.0 * ((point.intensity + heatmap.energy(cand, cand + HOOK_WINDOW_S)) / 2.0) + 10.0;
        if score > best.2 {
            best = (cand, BoundaryKind::EnergyPeak, score);
        }
    }

    (best.0, best.1)
}

/// Choose the segment end inside `[start + min, min(start + max, duration)]`.
fn find_end(
    start_s: f64,
    seg: &Segment,
    heatmap: &CombinedHeatmap,
    silences: &[SilenceInterval],
    duration_s: f64,
    opts: &BoundaryOptions,
) -> f64 {
    let lo = start_s + opts.min_duration_s;
    let hi = (start_s + opts.max_duration_s).min(duration_s);
    if lo >= hi {
        return seg.end_s.min(duration_s);
    }

    // First silence start in the window wins: the sentence just ended
    let mut sorted_silences: Vec<&SilenceInterval> = silences.iter().collect();
    sorted_silences
        .sort_by(|a, b| a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal));
    for silence in sorted_silences {
        if silence.start_s >= lo && silence.start_s <= hi {
            return silence.start_s;
        }
    }

    // Otherwise cut at the first significant energy drop
    let mut prev: Option<f64> = None;
    for point in &heatmap.points {
        let t = point.start_s();
        if t > hi {
            break;
        }
        if t >= lo {
            if let Some(prev_intensity) = prev {
                if prev_intensity > 0.4 && point.intensity < 0.5 * prev_intensity {
                    return t;
                }
            }
        }
        prev = Some(point.intensity);
    }

    seg.end_s.min(hi).max(lo)
}

/// Optimization never introduces overlaps: any conflicting segment reverts
/// to its detector bounds, and as a last resort the later start is clipped.
fn enforce_non_overlap(optimized: &mut [Segment], originals: &[Segment]) {
    optimized.sort_by(|a, b| a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal));

    for i in 1..optimized.len() {
        if optimized[i].start_s >= optimized[i - 1].end_s {
            continue;
        }

        // Fall back to the original bounds for the conflicting segment
        if let Some(orig) = originals.iter().find(|o| o.id == optimized[i].id) {
            revert(&mut optimized[i], orig);
        }
        if optimized[i].start_s >= optimized[i - 1].end_s {
            continue;
        }
        if let Some(orig) = originals.iter().find(|o| o.id == optimized[i - 1].id) {
            revert(&mut optimized[i - 1], orig);
        }
        if optimized[i].start_s >= optimized[i - 1].end_s {
            continue;
        }

        // Originals are gap-separated, so this only trims float dust
        let boundary = optimized[i - 1].end_s;
        optimized[i].start_s = boundary;
        optimized[i].duration_s = optimized[i].end_s - boundary;
    }
}

fn revert(seg: &mut Segment, orig: &Segment) {
    seg.start_s = orig.start_s;
    seg.end_s = orig.end_s;
    seg.duration_s = orig.duration_s;
    seg.boundary = BoundaryKind::Original;
    seg.hook_shift_s = 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::{IntensityPoint, SegmentId, SignalMethod};

    fn heatmap_from(values: &[f64]) -> CombinedHeatmap {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| IntensityPoint::new(i as u64 * 2000, (i as u64 + 1) * 2000, v))
            .collect();
        CombinedHeatmap {
            points,
            methods_used: vec![SignalMethod::Audio],
            window_ms: 2000,
        }
    }

    fn seg(start: f64, end: f64) -> Segment {
        Segment {
            id: SegmentId::new(),
            start_s: start,
            end_s: end,
            duration_s: end - start,
            avg_intensity: 0.5,
            peak_intensity: 0.8,
            peak_time_s: (start + end) / 2.0,
            boundary: BoundaryKind::Original,
            hook_score: 0,
            hook_shift_s: 0.0,
        }
    }

    #[test]
    fn test_start_snaps_to_silence_end() {
        // Scenario S5: silence [98, 99], segment [100, 140] — the start
        // snaps to 99 and is classified sentence_start.
        let heatmap = heatmap_from(&vec![0.6; 300]);
        let silences = [SilenceInterval { start_s: 98.0, end_s: 99.0 }];
        let result = optimize_boundaries(
            vec![seg(100.0, 140.0)],
            &heatmap,
            &silences,
            600.0,
            &BoundaryOptions::default(),
        );

        assert_eq!(result.len(), 1);
        assert!((result[0].start_s - 99.0).abs() < 0.11);
        assert_eq!(result[0].boundary, BoundaryKind::SentenceStart);
        assert!((result[0].hook_shift_s - (-1.0)).abs() < 0.11);
    }

    #[test]
    fn test_start_snaps_to_energy_peak_without_silence() {
        let mut values = vec![0.3f64; 300];
        values[48] = 0.9; // bucket starting at 96 s, inside [95, 102]
        let heatmap = heatmap_from(&values);

        let result = optimize_boundaries(
            vec![seg(100.0, 140.0)],
            &heatmap,
            &[],
            600.0,
            &BoundaryOptions::default(),
        );

        assert_eq!(result[0].boundary, BoundaryKind::EnergyPeak);
        assert!((result[0].start_s - 96.0).abs() < 0.11);
    }

    #[test]
    fn test_original_kept_when_nothing_better() {
        let heatmap = heatmap_from(&vec![0.3; 300]);
        let result = optimize_boundaries(
            vec![seg(100.0, 140.0)],
            &heatmap,
            &[],
            600.0,
            &BoundaryOptions::default(),
        );

        assert_eq!(result[0].boundary, BoundaryKind::Original);
        assert!((result[0].start_s - 100.0).abs() < 0.11);
        assert!((result[0].hook_shift_s).abs() < 1e-9);
    }

    #[test]
    fn test_end_prefers_silence_start() {
        let heatmap = heatmap_from(&vec![0.6; 300]);
        // Silence begins 35 s after the (unchanged) start, within bounds
        let silences = [SilenceInterval { start_s: 135.0, end_s: 136.0 }];
        let result = optimize_boundaries(
            vec![seg(100.0, 155.0)],
            &heatmap,
            &silences,
            600.0,
            &BoundaryOptions::default(),
        );

        assert!((result[0].end_s - 135.0).abs() < 0.11);
    }

    #[test]
    fn test_end_cuts_on_energy_drop() {
        let mut values = vec![0.7f64; 300];
        for item in values.iter_mut().skip(65) {
            *item = 0.2; // sharp drop at 130 s
        }
        let heatmap = heatmap_from(&values);

        let result = optimize_boundaries(
            vec![seg(100.0, 158.0)],
            &heatmap,
            &[],
            600.0,
            &BoundaryOptions::default(),
        );

        assert!(
            (result[0].end_s - 130.0).abs() < 2.1,
            "expected cut near 130, got {}",
            result[0].end_s
        );
    }

    #[test]
    fn test_duration_bounds_hold() {
        let heatmap = heatmap_from(&vec![0.6; 300]);
        let opts = BoundaryOptions::default();
        let result = optimize_boundaries(
            vec![seg(100.0, 140.0), seg(200.0, 230.0)],
            &heatmap,
            &[],
            600.0,
            &opts,
        );

        for s in &result {
            assert!(s.duration_s >= opts.min_duration_s - 0.11);
            assert!(s.duration_s <= opts.max_duration_s + 0.11);
            assert!(s.start_s >= 0.0 && s.end_s <= 600.0);
        }
    }

    #[test]
    fn test_overlap_reverts_to_original_bounds() {
        // The silence at 150 s drags the first segment's end past the
        // second segment's optimized start; the verify pass must fall back
        // to the detector bounds and keep the pair disjoint.
        let heatmap = heatmap_from(&vec![0.6; 300]);
        let silences = [SilenceInterval { start_s: 150.0, end_s: 151.0 }];
        let result = optimize_boundaries(
            vec![seg(100.0, 140.0), seg(145.0, 175.0)],
            &heatmap,
            &silences,
            600.0,
            &BoundaryOptions::default(),
        );

        assert!(result[1].start_s >= result[0].end_s - 1e-9);
        assert_eq!(result[0].boundary, BoundaryKind::Original);
        assert!((result[0].end_s - 140.0).abs() < 0.11);
        assert!((result[1].start_s - 145.0).abs() < 0.11);
    }

    #[test]
    fn test_hook_score_reflects_opening_energy() {
        let mut values = vec![0.2f64; 300];
        for item in values.iter_mut().take(53).skip(50) {
            *item = 1.0; // hot opening at 100..106 s
        }
        let heatmap = heatmap_from(&values);

        let result = optimize_boundaries(
            vec![seg(100.0, 130.0)],
            &heatmap,
            &[],
            600.0,
            &BoundaryOptions::default(),
        );

        assert!(result[0].hook_score >= 90, "hook {}", result[0].hook_score);
    }
}
