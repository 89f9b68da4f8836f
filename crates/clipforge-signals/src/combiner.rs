//! Multi-signal fusion onto a uniform time grid.

use tracing::debug;

use clipforge_models::{CombinedHeatmap, IntensityPoint, SignalMethod, SignalSource};

/// Options for signal combination.
#[derive(Debug, Clone)]
pub struct CombineOptions {
    /// Grid bucket width in milliseconds
    pub window_ms: u64,
    /// Centered moving-average window; `None` disables smoothing
    pub smoothing_window: Option<usize>,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            window_ms: 2000,
            smoothing_window: Some(3),
        }
    }
}

/// Fuse weighted signal sources into one normalized uniform-grid heatmap.
///
/// Empty sources are dropped. A single surviving source is returned
/// unchanged; multiple sources are each resampled onto the grid with
/// per-bucket maxima, normalized, weighted and accumulated, then the
/// accumulator is min-max normalized.
pub fn combine_signals(
    sources: Vec<SignalSource>,
    duration_ms: u64,
    opts: &CombineOptions,
) -> CombinedHeatmap {
    let sources: Vec<SignalSource> = sources.into_iter().filter(|s| !s.is_empty()).collect();

    if sources.is_empty() {
        return CombinedHeatmap {
            points: Vec::new(),
            methods_used: Vec::new(),
            window_ms: opts.window_ms,
        };
    }

    if sources.len() == 1 {
        let source = sources.into_iter().next().expect("one source");
        debug!(method = %source.method, points = source.points.len(), "single source, passing through");
        return CombinedHeatmap {
            points: source.points,
            methods_used: vec![source.method],
            window_ms: opts.window_ms,
        };
    }

    let buckets = (duration_ms as f64 / opts.window_ms as f64).ceil().max(1.0) as usize;
    let mut accumulator = vec![0.0f64; buckets];
    let mut methods_used: Vec<SignalMethod> = Vec::with_capacity(sources.len() + 1);

    for source in &sources {
        let mut grid = resample_max(&source.points, buckets, opts.window_ms);
        min_max_normalize(&mut grid);
        for (acc, value) in accumulator.iter_mut().zip(grid.iter()) {
            *acc += source.weight * value;
        }
        methods_used.push(source.method);
    }
    methods_used.push(SignalMethod::Combined);

    min_max_normalize(&mut accumulator);

    if let Some(window) = opts.smoothing_window {
        if window > 1 {
            accumulator = smooth(&accumulator, window);
        }
    }

    let points = accumulator
        .iter()
        .enumerate()
        .map(|(i, &intensity)| {
            let start_ms = i as u64 * opts.window_ms;
            let end_ms = ((i as u64 + 1) * opts.window_ms).min(duration_ms.max(start_ms + 1));
            IntensityPoint::new(start_ms, end_ms, intensity)
        })
        .collect();

    debug!(
        sources = methods_used.len() - 1,
        buckets = buckets,
        "combined signals"
    );

    CombinedHeatmap {
        points,
        methods_used,
        window_ms: opts.window_ms,
    }
}

/// Resample arbitrary points onto the grid, keeping the maximum intensity
/// per overlapped bucket.
fn resample_max(points: &[IntensityPoint], buckets: usize, window_ms: u64) -> Vec<f64> {
    let mut grid = vec![0.0f64; buckets];

    for point in points {
        if point.end_ms <= point.start_ms {
            continue;
        }
        let first = (point.start_ms / window_ms) as usize;
        let last = ((point.end_ms - 1) / window_ms) as usize;
        for bucket in grid.iter_mut().take(last.min(buckets - 1) + 1).skip(first.min(buckets)) {
            if point.intensity > *bucket {
                *bucket = point.intensity;
            }
        }
    }

    grid
}

/// Min-max normalize in place to `[0, 1]`.
///
/// A flat non-zero signal becomes all ones; a flat zero signal stays zero.
fn min_max_normalize(values: &mut [f64]) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values.iter() {
        min = min.min(v);
        max = max.max(v);
    }

    if !min.is_finite() || !max.is_finite() {
        return;
    }

    let range = max - min;
    if range > f64::EPSILON {
        for v in values.iter_mut() {
            *v = (*v - min) / range;
        }
    } else if max > 0.0 {
        for v in values.iter_mut() {
            *v = 1.0;
        }
    }
}

/// Centered moving average; edge buckets average over fewer neighbors.
fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            values[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_points(count: usize, window_ms: u64, intensity: f64) -> Vec<IntensityPoint> {
        (0..count)
            .map(|i| {
                IntensityPoint::new(i as u64 * window_ms, (i as u64 + 1) * window_ms, intensity)
            })
            .collect()
    }

    #[test]
    fn test_empty_sources_yield_empty_heatmap() {
        let result = combine_signals(Vec::new(), 60_000, &CombineOptions::default());
        assert!(result.points.is_empty());
        assert!(result.methods_used.is_empty());
    }

    #[test]
    fn test_single_source_identity() {
        // Invariant: combineSignals([s], duration) == s for non-empty s.
        let points = vec![
            IntensityPoint::new(0, 2000, 0.55),
            IntensityPoint::new(2000, 4000, 0.55),
        ];
        let source = SignalSource::new(SignalMethod::Heatmap, 1.0, points.clone());
        let result = combine_signals(vec![source], 4000, &CombineOptions::default());

        assert_eq!(result.points, points);
        assert_eq!(result.methods_used, vec![SignalMethod::Heatmap]);
    }

    #[test]
    fn test_resample_max_idempotent_on_uniform_grid() {
        // Invariant: resampling an aligned uniform grid onto itself changes nothing.
        let window_ms = 2000;
        let points: Vec<IntensityPoint> = [0.1, 0.9, 0.4, 0.7]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                IntensityPoint::new(i as u64 * window_ms, (i as u64 + 1) * window_ms, v)
            })
            .collect();

        let grid = resample_max(&points, 4, window_ms);
        for (point, value) in points.iter().zip(grid.iter()) {
            assert!((point.intensity - value).abs() < 1e-12);
        }
    }

    #[test]
    fn test_weighted_fusion_favors_heavier_source() {
        // Scenario S4: audio peak at 50 s (weight 1.0) vs comment peak at
        // 200 s (weight 1.2) — the global maximum must land nearer 200 s.
        let duration_ms = 300_000;
        let mut audio = uniform_points(150, 2000, 0.1);
        audio[25].intensity = 1.0; // 50 s
        let mut comments = uniform_points(150, 2000, 0.1);
        comments[100].intensity = 1.0; // 200 s

        let result = combine_signals(
            vec![
                SignalSource::new(SignalMethod::Audio, 1.0, audio),
                SignalSource::new(SignalMethod::Comments, 1.2, comments),
            ],
            duration_ms,
            &CombineOptions {
                window_ms: 2000,
                smoothing_window: None,
            },
        );

        let max_point = result
            .points
            .iter()
            .max_by(|a, b| a.intensity.partial_cmp(&b.intensity).unwrap())
            .unwrap();
        let max_time_s = max_point.start_s();
        assert!(
            (max_time_s - 200.0).abs() < (max_time_s - 50.0).abs(),
            "maximum at {}s should be nearer 200s",
            max_time_s
        );
        assert!(result.methods_used.contains(&SignalMethod::Combined));
    }

    #[test]
    fn test_accumulator_normalized_to_unit_range() {
        let a = uniform_points(10, 2000, 0.3);
        let b = uniform_points(10, 2000, 0.9);
        let result = combine_signals(
            vec![
                SignalSource::new(SignalMethod::Audio, 1.0, a),
                SignalSource::new(SignalMethod::Scene, 0.6, b),
            ],
            20_000,
            &CombineOptions::default(),
        );

        for p in &result.points {
            assert!((0.0..=1.0).contains(&p.intensity));
        }
    }

    #[test]
    fn test_last_bucket_clipped_to_duration() {
        let points = uniform_points(3, 2000, 0.5);
        let result = combine_signals(
            vec![
                SignalSource::new(SignalMethod::Audio, 1.0, points.clone()),
                SignalSource::new(SignalMethod::Scene, 0.6, points),
            ],
            5000, // not a multiple of window_ms
            &CombineOptions::default(),
        );

        assert_eq!(result.points.len(), 3);
        assert_eq!(result.points.last().unwrap().end_ms, 5000);
    }

    #[test]
    fn test_smoothing_averages_neighbors() {
        let smoothed = smooth(&[0.0, 1.0, 0.0, 0.0], 3);
        assert!((smoothed[0] - 0.5).abs() < 1e-12); // edge: two buckets
        assert!((smoothed[1] - (1.0 / 3.0)).abs() < 1e-12);
        assert!((smoothed[2] - (1.0 / 3.0)).abs() < 1e-12);
        assert!((smoothed[3] - 0.0).abs() < 1e-12);
    }
}
