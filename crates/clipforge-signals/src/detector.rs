//! Adaptive-threshold peak detection and greedy segment selection.

use tracing::debug;

use clipforge_models::{BoundaryKind, CombinedHeatmap, IntensityPoint, Segment, SegmentId};

/// Markers closer than this merge into one zone.
const ZONE_MERGE_GAP_MS: u64 = 3000;

/// Threshold floor for the adaptive pass.
const MIN_THRESHOLD: f64 = 0.2;

/// Minimum number of markers the adaptive pass tries to reach.
const MIN_MARKERS: usize = 5;

/// Peak detection options.
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    /// Maximum number of segments to select
    pub top_n: usize,
    /// Minimum segment duration, seconds
    pub min_duration_s: f64,
    /// Maximum segment duration, seconds
    pub max_duration_s: f64,
    /// Minimum gap between selected segments, seconds
    pub min_gap_s: f64,
    /// Initial intensity threshold
    pub intensity_threshold: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            min_duration_s: 15.0,
            max_duration_s: 60.0,
            min_gap_s: 30.0,
            intensity_threshold: 0.6,
        }
    }
}

/// Outcome of a detection run.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Selected segments, non-overlapping, sorted by start time
    pub segments: Vec<Segment>,
    /// Threshold that finally produced markers
    pub threshold_used: f64,
    /// Whether the relaxed-gap fallback admitted any segment
    pub relaxed: bool,
}

impl DetectionResult {
    fn empty(threshold: f64) -> Self {
        Self {
            segments: Vec::new(),
            threshold_used: threshold,
            relaxed: false,
        }
    }
}

/// A maximal above-threshold region of the heatmap.
#[derive(Debug, Clone)]
struct Zone {
    start_ms: u64,
    end_ms: u64,
    members: Vec<IntensityPoint>,
    peak_intensity: f64,
    peak_time_ms: u64,
}

impl Zone {
    fn from_marker(p: IntensityPoint) -> Self {
        Self {
            start_ms: p.start_ms,
            end_ms: p.end_ms,
            members: vec![p],
            peak_intensity: p.intensity,
            peak_time_ms: (p.start_ms + p.end_ms) / 2,
        }
    }

    fn absorb(&mut self, p: IntensityPoint) {
        self.end_ms = self.end_ms.max(p.end_ms);
        if p.intensity > self.peak_intensity {
            self.peak_intensity = p.intensity;
            self.peak_time_ms = (p.start_ms + p.end_ms) / 2;
        }
        self.members.push(p);
    }

    fn start_s(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    fn end_s(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    fn duration_s(&self) -> f64 {
        self.end_s() - self.start_s()
    }

    fn peak_time_s(&self) -> f64 {
        self.peak_time_ms as f64 / 1000.0
    }

    /// Average, peak and peak time over the members intersecting
    /// `[start_s, end_s)`; falls back to whole-zone stats on no overlap.
    fn stats_in(&self, start_s: f64, end_s: f64) -> (f64, f64, f64) {
        let overlapping: Vec<&IntensityPoint> = self
            .members
            .iter()
            .filter(|m| m.overlaps_secs(start_s, end_s))
            .collect();

        if overlapping.is_empty() {
            let avg = self.members.iter().map(|m| m.intensity).sum::<f64>()
                / self.members.len() as f64;
            return (avg, self.peak_intensity, self.peak_time_s());
        }

        let avg =
            overlapping.iter().map(|m| m.intensity).sum::<f64>() / overlapping.len() as f64;
        let peak = overlapping
            .iter()
            .max_by(|a, b| a.intensity.partial_cmp(&b.intensity).unwrap_or(std::cmp::Ordering::Equal))
            .expect("non-empty");
        (
            avg,
            peak.intensity,
            (peak.start_ms + peak.end_ms) as f64 / 2000.0,
        )
    }
}

/// A sized, scored candidate not yet admitted to the result.
#[derive(Debug, Clone)]
struct Candidate {
    start_s: f64,
    end_s: f64,
    avg_intensity: f64,
    peak_intensity: f64,
    peak_time_s: f64,
    score: f64,
}

impl Candidate {
    fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }

    fn gap_to(&self, other: &Candidate) -> f64 {
        (self.start_s - other.end_s).max(other.start_s - self.end_s)
    }
}

/// Detect the highest-scoring non-overlapping segments of a heatmap.
pub fn detect_segments(
    heatmap: &CombinedHeatmap,
    duration_s: f64,
    opts: &DetectorOptions,
) -> DetectionResult {
    if heatmap.points.is_empty() || duration_s <= 0.0 {
        return DetectionResult::empty(opts.intensity_threshold);
    }

    let (markers, threshold_used) = adaptive_markers(&heatmap.points, opts.intensity_threshold);
    if markers.is_empty() {
        debug!(threshold = threshold_used, "no markers above floor threshold");
        return DetectionResult::empty(threshold_used);
    }

    let zones = merge_zones(markers);
    let mut candidates: Vec<Candidate> = Vec::new();
    for zone in &zones {
        size_zone(zone, duration_s, opts, &mut candidates);
    }

    for c in &mut candidates {
        c.score = 1.0 * c.avg_intensity
            + 0.3 * c.peak_intensity
            + 0.1 * (c.duration_s() / opts.max_duration_s).min(1.0);
    }
    // Stable sort keeps zone order for equal scores
    candidates
        .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let (selected, relaxed) = select_greedy(&candidates, opts);

    let mut segments: Vec<Segment> = selected
        .into_iter()
        .map(|c| {
            Segment {
                id: SegmentId::new(),
                start_s: c.start_s,
                end_s: c.end_s,
                duration_s: c.duration_s(),
                avg_intensity: c.avg_intensity,
                peak_intensity: c.peak_intensity,
                peak_time_s: c.peak_time_s,
                boundary: BoundaryKind::Original,
                hook_score: 0,
                hook_shift_s: 0.0,
            }
            .rounded()
        })
        .collect();
    segments
        .sort_by(|a, b| a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal));

    debug!(
        zones = zones.len(),
        candidates = segments.len(),
        threshold = threshold_used,
        relaxed = relaxed,
        "peak detection complete"
    );

    DetectionResult {
        segments,
        threshold_used,
        relaxed,
    }
}

/// Lower the threshold in 0.1 steps until enough markers survive.
fn adaptive_markers(points: &[IntensityPoint], start_threshold: f64) -> (Vec<IntensityPoint>, f64) {
    let mut threshold = start_threshold;

    loop {
        let markers: Vec<IntensityPoint> = points
            .iter()
            .filter(|p| p.intensity >= threshold)
            .copied()
            .collect();

        if markers.len() >= MIN_MARKERS || threshold <= MIN_THRESHOLD {
            return (markers, threshold);
        }
        // Keep the step exact in decimal to avoid float drift
        threshold = ((threshold * 10.0).round() - 1.0) / 10.0;
    }
}

/// Merge time-sorted markers whose gap is at most 3 s into zones.
fn merge_zones(mut markers: Vec<IntensityPoint>) -> Vec<Zone> {
    markers.sort_by_key(|p| p.start_ms);

    let mut zones: Vec<Zone> = Vec::new();
    for marker in markers {
        match zones.last_mut() {
            Some(zone) if marker.start_ms.saturating_sub(zone.end_ms) <= ZONE_MERGE_GAP_MS => {
                zone.absorb(marker);
            }
            _ => zones.push(Zone::from_marker(marker)),
        }
    }
    zones
}

/// Size a zone into candidates.
///
/// A zone within duration bounds yields one candidate, expanded around the
/// peak when too short. An oversized zone yields the peak-centered window
/// plus max-duration tiles over the rest of the zone; tiles overlap nothing
/// by construction, and the gap constraint spaces them at selection time.
fn size_zone(zone: &Zone, duration_s: f64, opts: &DetectorOptions, out: &mut Vec<Candidate>) {
    if zone.duration_s() <= opts.max_duration_s {
        let (mut start_s, mut end_s) = (zone.start_s(), zone.end_s());

        if zone.duration_s() < opts.min_duration_s {
            let half = opts.min_duration_s / 2.0;
            start_s = zone.peak_time_s() - half;
            end_s = zone.peak_time_s() + half;
        }
        let (start_s, end_s) = clamp_window(start_s, end_s, duration_s, opts.min_duration_s);
        out.push(make_candidate(zone, start_s, end_s));
        return;
    }

    // Peak-centered primary window
    let half = opts.max_duration_s / 2.0;
    let (primary_start, primary_end) = clamp_window(
        zone.peak_time_s() - half,
        zone.peak_time_s() + half,
        duration_s,
        opts.max_duration_s,
    );
    out.push(make_candidate(zone, primary_start, primary_end));

    // Tile leftwards from the primary window to the zone start
    let mut end = primary_start;
    while end - zone.start_s() >= opts.min_duration_s {
        let start = (end - opts.max_duration_s).max(zone.start_s());
        out.push(make_candidate(zone, start, end));
        end = start;
    }

    // Tile rightwards from the primary window to the zone end
    let mut start = primary_end;
    while zone.end_s() - start >= opts.min_duration_s {
        let end = (start + opts.max_duration_s).min(zone.end_s()).min(duration_s);
        if end <= start {
            break;
        }
        out.push(make_candidate(zone, start, end));
        start = end;
    }
}

/// Clamp a window to `[0, duration]`, shifting the opposite edge to keep
/// the target length when clipped at a video boundary.
fn clamp_window(start_s: f64, end_s: f64, duration_s: f64, target_s: f64) -> (f64, f64) {
    let target = (end_s - start_s).max(target_s);
    let mut start = start_s;
    let mut end = end_s;

    if start < 0.0 {
        start = 0.0;
        end = target.min(duration_s);
    }
    if end > duration_s {
        end = duration_s;
        start = (duration_s - target).max(0.0);
    }
    (start, end)
}

fn make_candidate(zone: &Zone, start_s: f64, end_s: f64) -> Candidate {
    let (avg, peak, peak_time_s) = zone.stats_in(start_s, end_s);
    Candidate {
        start_s,
        end_s,
        avg_intensity: avg,
        peak_intensity: peak,
        peak_time_s,
        score: 0.0,
    }
}

/// Greedy selection under the gap constraint, with a one-shot relaxation
/// pass at `max(min_gap / 2, 10)` when the strict pass comes up short.
fn select_greedy(candidates: &[Candidate], opts: &DetectorOptions) -> (Vec<Candidate>, bool) {
    let mut selected: Vec<Candidate> = Vec::with_capacity(opts.top_n);
    let mut taken = vec![false; candidates.len()];

    admit_pass(candidates, &mut selected, &mut taken, opts.min_gap_s, opts.top_n);

    let mut relaxed = false;
    if selected.len() < opts.top_n && taken.iter().any(|t| !t) {
        let relaxed_gap = (opts.min_gap_s / 2.0).max(10.0);
        let before = selected.len();
        admit_pass(candidates, &mut selected, &mut taken, relaxed_gap, opts.top_n);
        relaxed = selected.len() > before;
    }

    (selected, relaxed)
}

fn admit_pass(
    candidates: &[Candidate],
    selected: &mut Vec<Candidate>,
    taken: &mut [bool],
    gap_s: f64,
    top_n: usize,
) {
    for (i, candidate) in candidates.iter().enumerate() {
        if selected.len() >= top_n {
            break;
        }
        if taken[i] {
            continue;
        }
        // A negative gap means overlap and is always rejected
        if selected.iter().all(|s| candidate.gap_to(s) >= gap_s) {
            selected.push(candidate.clone());
            taken[i] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::SignalMethod;

    fn heatmap_from(values: &[f64], window_ms: u64) -> CombinedHeatmap {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                IntensityPoint::new(i as u64 * window_ms, (i as u64 + 1) * window_ms, v)
            })
            .collect();
        CombinedHeatmap {
            points,
            methods_used: vec![SignalMethod::Heatmap],
            window_ms,
        }
    }

    /// Uniform 0.2 background with 10 s bumps of the given intensity.
    fn bumpy_heatmap(duration_s: u64, bumps: &[(u64, f64)]) -> CombinedHeatmap {
        let buckets = (duration_s / 2) as usize;
        let mut values = vec![0.2f64; buckets];
        for &(at_s, intensity) in bumps {
            for i in 0..5 {
                let idx = (at_s / 2) as usize + i;
                if idx < buckets {
                    values[idx] = intensity;
                }
            }
        }
        heatmap_from(&values, 2000)
    }

    #[test]
    fn test_well_spaced_peaks_all_selected() {
        // Scenario S1: four bumps at 100/250/410/520 s, defaults.
        let heatmap = bumpy_heatmap(
            600,
            &[(100, 0.9), (250, 0.95), (410, 0.92), (520, 0.88)],
        );
        let opts = DetectorOptions::default();
        let result = detect_segments(&heatmap, 600.0, &opts);

        assert_eq!(result.segments.len(), 4);
        assert!(!result.relaxed);

        let expected_centers = [105.0, 255.0, 415.0, 525.0];
        for (segment, center) in result.segments.iter().zip(expected_centers) {
            assert!(
                (segment.peak_time_s - center).abs() < 10.0,
                "segment near {} expected, got peak at {}",
                center,
                segment.peak_time_s
            );
            assert!(segment.duration_s >= opts.min_duration_s - 0.1);
        }
        for pair in result.segments.windows(2) {
            assert!(pair[1].start_s - pair[0].end_s >= opts.min_gap_s - 0.1);
        }
    }

    #[test]
    fn test_threshold_relaxation_on_flat_heatmap() {
        // Scenario S2: flat 0.55 heatmap, below the 0.6 default threshold.
        // The detector relaxes to 0.5 and still yields top_n well-separated
        // segments by tiling the single full-length zone.
        let heatmap = heatmap_from(&vec![0.55; 300], 2000);
        let opts = DetectorOptions::default();
        let result = detect_segments(&heatmap, 600.0, &opts);

        assert!(result.threshold_used < 0.6);
        assert_eq!(result.segments.len(), opts.top_n);
        for pair in result.segments.windows(2) {
            let gap = pair[1].start_s - pair[0].end_s;
            assert!(gap >= opts.min_gap_s - 0.1, "gap {} too small", gap);
        }
        // Uniform spacing: all gaps equal
        let gaps: Vec<f64> = result
            .segments
            .windows(2)
            .map(|p| p[1].start_s - p[0].end_s)
            .collect();
        for gap in &gaps {
            assert!((gap - gaps[0]).abs() < 1.0);
        }
    }

    #[test]
    fn test_all_zero_heatmap_yields_empty() {
        let heatmap = heatmap_from(&vec![0.0; 100], 2000);
        let result = detect_segments(&heatmap, 200.0, &DetectorOptions::default());
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_zone_merge_across_small_gap() {
        // Scenario S3: peaks at 100 s and 101 s merge into one zone.
        let mut values = vec![0.1f64; 300];
        values[50] = 0.9; // 100..102 s
        values[51] = 0.85; // 102..104 s
        let heatmap = heatmap_from(&values, 2000);

        let result = detect_segments(&heatmap, 600.0, &DetectorOptions::default());
        assert_eq!(result.segments.len(), 1);
        let seg = &result.segments[0];
        assert!(
            seg.start_s < 101.0 && seg.end_s > 101.0,
            "single merged segment must span the paired peaks"
        );
    }

    #[test]
    fn test_zone_merge_gap_boundary() {
        let a = IntensityPoint::new(10_000, 12_000, 0.9);
        let within = IntensityPoint::new(15_000, 17_000, 0.8); // 3 s gap: merges
        let beyond = IntensityPoint::new(20_100, 22_000, 0.8); // > 3 s: new zone

        assert_eq!(merge_zones(vec![a, within]).len(), 1);
        assert_eq!(merge_zones(vec![a, beyond]).len(), 2);
    }

    #[test]
    fn test_candidate_expansion_at_video_start() {
        // Peak near t=0 cannot expand backwards, so the end edge shifts.
        let mut values = vec![0.1f64; 100];
        values[1] = 0.95;
        let heatmap = heatmap_from(&values, 2000);

        let result = detect_segments(&heatmap, 200.0, &DetectorOptions::default());
        assert_eq!(result.segments.len(), 1);
        let seg = &result.segments[0];
        assert!(seg.start_s >= 0.0);
        assert!(seg.duration_s >= 15.0 - 0.1);
    }

    #[test]
    fn test_oversized_zone_keeps_peak_centered_window() {
        // 120 s of continuous high intensity with the max in the middle.
        let mut values = vec![0.1f64; 300];
        for item in values.iter_mut().take(160).skip(100) {
            *item = 0.7;
        }
        values[130] = 0.99; // peak at 260..262 s
        let heatmap = heatmap_from(&values, 2000);

        let opts = DetectorOptions {
            top_n: 1,
            ..Default::default()
        };
        let result = detect_segments(&heatmap, 600.0, &opts);
        assert_eq!(result.segments.len(), 1);
        let seg = &result.segments[0];
        assert!(seg.duration_s <= opts.max_duration_s + 0.1);
        assert!(
            seg.start_s < 261.0 && 261.0 < seg.end_s,
            "peak must stay inside the selected window, got [{}, {}]",
            seg.start_s,
            seg.end_s
        );
        assert!((seg.peak_intensity - 0.99).abs() < 0.02);
    }

    #[test]
    fn test_relaxation_admits_closer_segments() {
        // Two strong zones whose sized candidates end up ~19 s apart:
        // the strict 30 s gap admits one, the relaxed pass (15 s) admits
        // the second.
        let mut values = vec![0.1f64; 150];
        for item in values.iter_mut().take(55).skip(50) {
            *item = 0.9; // 100..110 s
        }
        for item in values.iter_mut().take(72).skip(67) {
            *item = 0.88; // 134..144 s
        }
        let heatmap = heatmap_from(&values, 2000);

        let opts = DetectorOptions {
            top_n: 2,
            ..Default::default()
        };
        let result = detect_segments(&heatmap, 300.0, &opts);
        assert_eq!(result.segments.len(), 2);
        assert!(result.relaxed);
        // Even relaxed selection never overlaps
        assert!(result.segments[1].start_s >= result.segments[0].end_s);
    }

    #[test]
    fn test_segments_sorted_and_in_bounds() {
        let heatmap = bumpy_heatmap(600, &[(520, 0.9), (100, 0.95)]);
        let result = detect_segments(&heatmap, 600.0, &DetectorOptions::default());

        for pair in result.segments.windows(2) {
            assert!(pair[0].start_s <= pair[1].start_s);
        }
        for seg in &result.segments {
            assert!(seg.start_s >= 0.0);
            assert!(seg.end_s <= 600.0);
            assert!(seg.start_s < seg.end_s);
        }
    }

    #[test]
    fn test_adaptive_threshold_steps_are_exact() {
        let points: Vec<IntensityPoint> = (0..10)
            .map(|i| IntensityPoint::new(i * 2000, (i + 1) * 2000, 0.35))
            .collect();
        let (markers, threshold) = adaptive_markers(&points, 0.6);
        assert!((threshold - 0.3).abs() < 1e-12);
        assert_eq!(markers.len(), 10);
    }
}
