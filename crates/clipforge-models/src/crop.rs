//! Crop modes, output quality and reframe plans.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a wider-than-tall source is mapped into the vertical output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Scale up preserving aspect, center-crop to target
    #[default]
    Center,
    /// Blurred scaled-up background with the fitted source overlaid
    BlurPad,
    /// Fit inside with black padding
    Letterbox,
    /// Content-aware crop tracked per frame
    SmartReframe,
}

impl CropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Center => "center",
            CropMode::BlurPad => "blur_pad",
            CropMode::Letterbox => "letterbox",
            CropMode::SmartReframe => "smart_reframe",
        }
    }

    /// Whether this mode needs the per-frame reframe analysis pass.
    pub fn needs_reframe_analysis(&self) -> bool {
        matches!(self, CropMode::SmartReframe)
    }
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(CropMode::Center),
            "blur_pad" => Ok(CropMode::BlurPad),
            "letterbox" => Ok(CropMode::Letterbox),
            "smart_reframe" => Ok(CropMode::SmartReframe),
            other => Err(format!("unknown crop mode: {}", other)),
        }
    }
}

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Quality {
    #[serde(rename = "1080")]
    #[default]
    Q1080,
    #[serde(rename = "720")]
    Q720,
    #[serde(rename = "480")]
    Q480,
}

impl Quality {
    /// Parse from the plain integers accepted on the wire.
    pub fn from_height(height: u32) -> Self {
        match height {
            0..=480 => Quality::Q480,
            481..=720 => Quality::Q720,
            _ => Quality::Q1080,
        }
    }

    /// Source resolution cap requested from the downloader.
    pub fn height_cap(&self) -> u32 {
        match self {
            Quality::Q1080 => 1080,
            Quality::Q720 => 720,
            Quality::Q480 => 480,
        }
    }

    /// CRF used for the final encode.
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Q1080 => 18,
            Quality::Q720 => 20,
            Quality::Q480 => 22,
        }
    }

    /// Output frame size (9:16).
    pub fn output_size(&self) -> (u32, u32) {
        match self {
            Quality::Q1080 => (1080, 1920),
            Quality::Q720 => (720, 1280),
            Quality::Q480 => (480, 854),
        }
    }
}

/// Crop-window center at one sampled frame, from reframe analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CropKeyframe {
    /// Time within the clip, seconds
    pub time_s: f64,
    /// Crop-window left edge as a fraction of source width, `[0, 1]`
    pub x_frac: f64,
}

/// Resolved crop trajectory for a smart-reframe clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CropPlan {
    /// One fixed crop window
    Static { x_frac: f64 },
    /// Crop x moves piecewise-linearly between keyframes
    Dynamic { keyframes: Vec<CropKeyframe> },
}

impl CropPlan {
    /// Static plan centered on the frame.
    pub fn centered() -> Self {
        CropPlan::Static { x_frac: 0.5 }
    }

    /// Collapse a dynamic plan whose keyframes never move into a static one.
    pub fn simplified(self) -> Self {
        if let CropPlan::Dynamic { keyframes } = &self {
            if let Some(first) = keyframes.first() {
                let moves = keyframes
                    .iter()
                    .any(|k| (k.x_frac - first.x_frac).abs() > 0.01);
                if !moves {
                    return CropPlan::Static {
                        x_frac: first.x_frac,
                    };
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_mode_parse() {
        assert_eq!("center".parse::<CropMode>().unwrap(), CropMode::Center);
        assert_eq!(
            "smart_reframe".parse::<CropMode>().unwrap(),
            CropMode::SmartReframe
        );
        assert!("diagonal".parse::<CropMode>().is_err());
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(Quality::from_height(1080), Quality::Q1080);
        assert_eq!(Quality::from_height(720), Quality::Q720);
        assert_eq!(Quality::from_height(480), Quality::Q480);
        assert_eq!(Quality::Q1080.crf(), 18);
        assert_eq!(Quality::Q720.crf(), 20);
        assert_eq!(Quality::Q480.crf(), 22);
    }

    #[test]
    fn test_crop_plan_simplify() {
        let still = CropPlan::Dynamic {
            keyframes: vec![
                CropKeyframe { time_s: 0.0, x_frac: 0.4 },
                CropKeyframe { time_s: 1.0, x_frac: 0.405 },
            ],
        };
        assert!(matches!(still.simplified(), CropPlan::Static { .. }));

        let moving = CropPlan::Dynamic {
            keyframes: vec![
                CropKeyframe { time_s: 0.0, x_frac: 0.1 },
                CropKeyframe { time_s: 1.0, x_frac: 0.8 },
            ],
        };
        assert!(matches!(moving.simplified(), CropPlan::Dynamic { .. }));
    }
}
