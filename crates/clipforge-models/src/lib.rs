//! Shared data models for the Clipforge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Intensity heatmaps and signal sources
//! - Highlight segments and detection summaries
//! - Virality score breakdowns
//! - Jobs and progress events
//! - Crop modes, output quality and reframe plans
//! - Subtitles and caption styling

pub mod captions;
pub mod crop;
pub mod heatmap;
pub mod job;
pub mod segment;
pub mod timestamp;
pub mod utils;
pub mod video;
pub mod virality;

// Re-export common types
pub use captions::{CaptionAnimation, CaptionPosition, CaptionPreset, CaptionStyle, SubtitleEntry};
pub use crop::{CropKeyframe, CropMode, CropPlan, Quality};
pub use heatmap::{CombinedHeatmap, CommentMoment, IntensityPoint, SignalMethod, SignalSource};
pub use job::{JobId, JobProgress, JobStatus};
pub use segment::{BoundaryKind, DetectionSummary, Segment, SegmentId};
pub use timestamp::{format_clock, format_timestamp, parse_timestamp};
pub use utils::{output_filename, sanitize_title};
pub use video::{HeatmapMarker, VideoMeta};
pub use virality::{ViralityBreakdown, ViralityLabel};
