//! The Clipforge peak detection engine.
//!
//! Pure, deterministic signal processing: heterogeneous probe outputs are
//! fused onto a uniform grid ([`combiner`]), peaks are extracted under an
//! adaptive threshold and selected greedily ([`detector`]), boundaries are
//! snapped to natural sentence/scene edges ([`boundary`]), and surviving
//! segments are annotated with a weighted virality score ([`virality`]).

pub mod boundary;
pub mod combiner;
pub mod detector;
pub mod virality;

pub use boundary::{optimize_boundaries, BoundaryOptions, SilenceInterval};
pub use combiner::{combine_signals, CombineOptions};
pub use detector::{detect_segments, DetectionResult, DetectorOptions};
pub use virality::score_segment;
