//! End-to-end detection pipeline tests: fuse signals, detect peaks,
//! optimize boundaries and score the survivors.

use clipforge_models::{IntensityPoint, SignalMethod, SignalSource};
use clipforge_signals::{
    combine_signals, detect_segments, optimize_boundaries, score_segment, BoundaryOptions,
    CombineOptions, DetectorOptions, SilenceInterval,
};

fn points(values: &[f64], window_ms: u64) -> Vec<IntensityPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| IntensityPoint::new(i as u64 * window_ms, (i as u64 + 1) * window_ms, v))
        .collect()
}

#[test]
fn heatmap_only_video_produces_clean_ranked_clips() {
    // A 600 s video with four well-separated engagement bumps.
    let duration_s = 600.0;
    let mut values = vec![0.2f64; 300];
    for (at_s, intensity) in [(100u64, 0.9), (250, 0.95), (410, 0.92), (520, 0.88)] {
        for i in 0..5 {
            values[(at_s / 2) as usize + i] = intensity;
        }
    }

    let heatmap = combine_signals(
        vec![SignalSource::new(
            SignalMethod::Heatmap,
            1.0,
            points(&values, 2000),
        )],
        600_000,
        &CombineOptions::default(),
    );
    assert_eq!(heatmap.methods_used, vec![SignalMethod::Heatmap]);

    let detector_opts = DetectorOptions::default();
    let detection = detect_segments(&heatmap, duration_s, &detector_opts);
    assert_eq!(detection.segments.len(), 4);

    let boundary_opts = BoundaryOptions {
        min_duration_s: detector_opts.min_duration_s,
        max_duration_s: detector_opts.max_duration_s,
    };
    let silences = [
        SilenceInterval { start_s: 96.0, end_s: 97.5 },
        SilenceInterval { start_s: 246.0, end_s: 247.0 },
    ];
    let optimized = optimize_boundaries(
        detection.segments,
        &heatmap,
        &silences,
        duration_s,
        &boundary_opts,
    );

    // Invariants: non-overlap, duration bounds, in-bounds.
    assert_eq!(optimized.len(), 4);
    for pair in optimized.windows(2) {
        assert!(pair[1].start_s >= pair[0].end_s);
    }
    for seg in &optimized {
        assert!(seg.duration_s >= boundary_opts.min_duration_s - 0.11);
        assert!(seg.duration_s <= boundary_opts.max_duration_s + 0.11);
        assert!(seg.start_s >= 0.0 && seg.end_s <= duration_s);

        let score = score_segment(seg, &heatmap, duration_s);
        assert!(score.overall <= 100);
        assert!(!score.label.is_empty());
    }
}

#[test]
fn fused_fallback_signals_still_respect_gap_discipline() {
    // No provider heatmap: audio, scene and comments are fused with the
    // fallback weights and the detector runs on the fused grid.
    let duration_ms = 400_000u64;
    let mut audio = vec![0.3f64; 200];
    let mut scene = vec![0.1f64; 200];
    let mut comments = vec![0.0f64; 200];
    for i in 40..45 {
        audio[i] = 1.0; // 80..90 s
    }
    for i in 120..123 {
        scene[i] = 1.0; // 240..246 s
        comments[i] = 1.0;
    }

    let heatmap = combine_signals(
        vec![
            SignalSource::new(SignalMethod::Audio, 1.0, points(&audio, 2000)),
            SignalSource::new(SignalMethod::Scene, 0.6, points(&scene, 2000)),
            SignalSource::new(SignalMethod::Comments, 1.2, points(&comments, 2000)),
        ],
        duration_ms,
        &CombineOptions::default(),
    );

    assert!(heatmap.methods_used.contains(&SignalMethod::Combined));
    assert_eq!(heatmap.primary_method(), Some(SignalMethod::Audio));

    let opts = DetectorOptions::default();
    let detection = detect_segments(&heatmap, 400.0, &opts);
    assert!(detection.segments.len() >= 2);

    // The comments+scene peak outweighs the audio-only peak.
    let best = detection
        .segments
        .iter()
        .max_by(|a, b| a.peak_intensity.partial_cmp(&b.peak_intensity).unwrap())
        .unwrap();
    assert!(
        (best.peak_time_s - 245.0).abs() < 15.0,
        "strongest segment should sit near 245 s, got {}",
        best.peak_time_s
    );

    if !detection.relaxed {
        for pair in detection.segments.windows(2) {
            assert!(pair[1].start_s - pair[0].end_s >= opts.min_gap_s - 0.11);
        }
    }
}

#[test]
fn empty_probe_outputs_produce_empty_detection() {
    let heatmap = combine_signals(
        vec![
            SignalSource::new(SignalMethod::Audio, 1.0, Vec::new()),
            SignalSource::new(SignalMethod::Scene, 0.6, Vec::new()),
        ],
        600_000,
        &CombineOptions::default(),
    );
    assert!(heatmap.points.is_empty());

    let detection = detect_segments(&heatmap, 600.0, &DetectorOptions::default());
    assert!(detection.segments.is_empty());
}
