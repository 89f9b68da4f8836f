//! Source video metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw viewer-engagement marker as reported by the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HeatmapMarker {
    /// Start of the marker window, seconds
    #[serde(rename = "start_time")]
    pub start_time: f64,
    /// End of the marker window, seconds
    #[serde(rename = "end_time")]
    pub end_time: f64,
    /// Engagement value, already normalized to `[0, 1]`
    pub value: f64,
}

/// Metadata for a source video, fetched once per request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoMeta {
    /// Provider video id when derivable, else an opaque token
    pub id: String,
    pub title: String,
    /// Duration in seconds
    pub duration_s: f64,
    pub width: u32,
    pub height: u32,
    /// Precomputed viewer-engagement markers, when the provider has them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heatmap: Vec<HeatmapMarker>,
}

impl VideoMeta {
    /// Whether the source already fits a vertical (>= 9:16) frame.
    pub fn is_vertical(&self) -> bool {
        self.width > 0 && self.height as f64 / self.width as f64 >= 16.0 / 9.0
    }

    pub fn has_heatmap(&self) -> bool {
        !self.heatmap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_vertical() {
        let mut meta = VideoMeta {
            id: "abc".into(),
            title: "t".into(),
            duration_s: 60.0,
            width: 1920,
            height: 1080,
            heatmap: Vec::new(),
        };
        assert!(!meta.is_vertical());

        meta.width = 1080;
        meta.height = 1920;
        assert!(meta.is_vertical());
    }

    #[test]
    fn test_marker_deserialization() {
        let json = r#"{"start_time": 10.0, "end_time": 20.0, "value": 0.7}"#;
        let m: HeatmapMarker = serde_json::from_str(json).unwrap();
        assert!((m.value - 0.7).abs() < 1e-9);
    }
}
