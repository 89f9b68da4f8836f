//! Viewer-engagement heatmap probe.
//!
//! The downloader's metadata dump already carries engagement markers for
//! many sources; this probe only maps them onto intensity points. Values
//! arrive normalized to `[0, 1]` and are not renormalized.

use clipforge_models::{HeatmapMarker, IntensityPoint};

/// Map provider engagement markers into an intensity curve.
pub fn heatmap_probe(markers: &[HeatmapMarker]) -> Vec<IntensityPoint> {
    markers
        .iter()
        .filter(|m| m.end_time > m.start_time)
        .map(|m| {
            IntensityPoint::new(
                (m.start_time * 1000.0) as u64,
                (m.end_time * 1000.0) as u64,
                m.value.clamp(0.0, 1.0),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_markers() {
        let markers = [
            HeatmapMarker { start_time: 0.0, end_time: 6.0, value: 0.4 },
            HeatmapMarker { start_time: 6.0, end_time: 12.0, value: 0.9 },
        ];
        let points = heatmap_probe(&markers);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].start_ms, 0);
        assert_eq!(points[0].end_ms, 6000);
        assert!((points[1].intensity - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_skips_degenerate_markers() {
        let markers = [HeatmapMarker { start_time: 5.0, end_time: 5.0, value: 0.4 }];
        assert!(heatmap_probe(&markers).is_empty());
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let markers = [HeatmapMarker { start_time: 0.0, end_time: 1.0, value: 1.7 }];
        assert_eq!(heatmap_probe(&markers)[0].intensity, 1.0);
    }

    #[test]
    fn test_empty_on_no_markers() {
        assert!(heatmap_probe(&[]).is_empty());
    }
}
