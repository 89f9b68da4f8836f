//! Highlight segments produced by peak detection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::heatmap::SignalMethod;

/// Stable opaque identifier for a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Mint a new unique segment ID.
    pub fn new() -> Self {
        Self(format!("seg_{}", &Uuid::new_v4().simple().to_string()[..12]))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a segment start boundary was chosen by the boundary optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Snapped to the end of a silence interval
    SentenceStart,
    /// Snapped to a high-energy point
    EnergyPeak,
    /// Kept the detector's original boundary
    #[default]
    Original,
}

/// A selected highlight segment.
///
/// Segments in a result list are strictly non-overlapping and sorted by
/// `start_s` ascending.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    /// Start time in seconds, rounded to 0.1 s
    pub start_s: f64,
    /// End time in seconds, rounded to 0.1 s
    pub end_s: f64,
    /// Duration in seconds, rounded to 0.1 s
    pub duration_s: f64,
    /// Mean intensity over the segment, rounded to 0.001
    pub avg_intensity: f64,
    /// Peak intensity inside the segment, rounded to 0.001
    pub peak_intensity: f64,
    /// Time of the peak in seconds
    pub peak_time_s: f64,
    /// How the start boundary was chosen
    #[serde(default)]
    pub boundary: BoundaryKind,
    /// Opening-hook energy score, 0..100
    #[serde(default)]
    pub hook_score: u32,
    /// How far the start moved during boundary optimization, seconds
    #[serde(default)]
    pub hook_shift_s: f64,
}

impl Segment {
    /// Round times to 0.1 s and intensities to 0.001, as reported to clients.
    pub fn rounded(mut self) -> Self {
        self.start_s = round1(self.start_s);
        self.end_s = round1(self.end_s);
        self.duration_s = round1(self.duration_s);
        self.avg_intensity = round3(self.avg_intensity);
        self.peak_intensity = round3(self.peak_intensity);
        self
    }

    /// Gap in seconds between this segment and another, negative on overlap.
    pub fn gap_to(&self, other: &Segment) -> f64 {
        (self.start_s - other.end_s).max(other.start_s - self.end_s)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Summary of how detection arrived at its result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    /// Best-effort primary signal method
    pub primary: SignalMethod,
    /// Every contributing method (plus `combined` when fused)
    pub methods_used: Vec<SignalMethod>,
    /// Threshold that finally produced markers
    pub threshold_used: f64,
    /// Whether the relaxed-gap fallback pass admitted segments
    pub relaxed: bool,
}
