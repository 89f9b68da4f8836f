//! Intensity heatmaps and the signals that produce them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One time-bucketed intensity sample.
///
/// `start_ms < end_ms` always holds; intensity is normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntensityPoint {
    /// Bucket start in milliseconds
    pub start_ms: u64,
    /// Bucket end in milliseconds
    pub end_ms: u64,
    /// Normalized intensity in `[0, 1]`
    pub intensity: f64,
}

impl IntensityPoint {
    pub fn new(start_ms: u64, end_ms: u64, intensity: f64) -> Self {
        debug_assert!(start_ms < end_ms, "intensity point must span a range");
        Self {
            start_ms,
            end_ms,
            intensity,
        }
    }

    /// Bucket start in seconds.
    pub fn start_s(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    /// Bucket end in seconds.
    pub fn end_s(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    /// Whether this point overlaps the half-open second range `[start_s, end_s)`.
    pub fn overlaps_secs(&self, start_s: f64, end_s: f64) -> bool {
        self.start_s() < end_s && self.end_s() > start_s
    }
}

/// Method that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalMethod {
    /// Viewer-engagement heatmap from the downloader
    Heatmap,
    /// Audio RMS energy
    Audio,
    /// Scene-change density
    Scene,
    /// Comment timestamp mentions
    Comments,
    /// Sentinel for fused multi-source heatmaps
    Combined,
}

impl SignalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalMethod::Heatmap => "heatmap",
            SignalMethod::Audio => "audio",
            SignalMethod::Scene => "scene",
            SignalMethod::Comments => "comments",
            SignalMethod::Combined => "combined",
        }
    }
}

impl fmt::Display for SignalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw signal: a weighted sequence of intensity points from a single probe.
///
/// Built per analysis request and consumed by the combiner.
#[derive(Debug, Clone)]
pub struct SignalSource {
    pub method: SignalMethod,
    /// Fusion weight, `>= 0`
    pub weight: f64,
    /// Monotonic by `start_ms`; gaps allowed
    pub points: Vec<IntensityPoint>,
}

impl SignalSource {
    pub fn new(method: SignalMethod, weight: f64, points: Vec<IntensityPoint>) -> Self {
        Self {
            method,
            weight,
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A uniform-grid heatmap produced by the signal combiner.
///
/// Every point spans exactly `window_ms` (except possibly the last, which is
/// clipped to the video duration) and intensities are min-max normalized.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CombinedHeatmap {
    pub points: Vec<IntensityPoint>,
    /// Every method that contributed, plus `combined` when more than one did
    pub methods_used: Vec<SignalMethod>,
    /// Grid bucket width in milliseconds
    pub window_ms: u64,
}

impl CombinedHeatmap {
    /// The method reported as primary: the first non-sentinel contributor.
    pub fn primary_method(&self) -> Option<SignalMethod> {
        self.methods_used
            .iter()
            .copied()
            .find(|m| *m != SignalMethod::Combined)
    }

    /// Mean intensity of points intersecting the half-open range `[start_s, end_s)`.
    ///
    /// Returns 0.0 when no point intersects the range.
    pub fn energy(&self, start_s: f64, end_s: f64) -> f64 {
        let mut sum = 0.0;
        let mut n = 0usize;
        for p in &self.points {
            if p.overlaps_secs(start_s, end_s) {
                sum += p.intensity;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// Intensity of the bucket containing `time_s`, if any.
    pub fn intensity_at(&self, time_s: f64) -> Option<f64> {
        let ms = (time_s * 1000.0) as u64;
        self.points
            .iter()
            .find(|p| p.start_ms <= ms && ms < p.end_ms)
            .map(|p| p.intensity)
    }

    /// Intensities of all points fully or partially inside `[start_s, end_s)`.
    pub fn intensities_in(&self, start_s: f64, end_s: f64) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| p.overlaps_secs(start_s, end_s))
            .map(|p| p.intensity)
            .collect()
    }
}

/// A timestamp frequently mentioned in comments, for explainability.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentMoment {
    /// Bucket time in seconds
    pub time_s: f64,
    /// Number of comments referencing this bucket
    pub count: u32,
    /// One of the referencing comments, truncated
    pub sample_text: String,
}
