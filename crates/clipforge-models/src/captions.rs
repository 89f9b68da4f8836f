//! Subtitle entries and caption overlay styling.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One subtitle cue, clip-relative once sliced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleEntry {
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(start_s: f64, end_s: f64, text: impl Into<String>) -> Self {
        Self {
            start_s,
            end_s,
            text: text.into(),
        }
    }

    pub fn duration_s(&self) -> f64 {
        (self.end_s - self.start_s).max(0.0)
    }
}

/// Slice full-video subtitles to `[start_s, end_s]` and rebase times to 0.
pub fn slice_subtitles(entries: &[SubtitleEntry], start_s: f64, end_s: f64) -> Vec<SubtitleEntry> {
    entries
        .iter()
        .filter(|e| e.end_s > start_s && e.start_s < end_s)
        .map(|e| SubtitleEntry {
            start_s: (e.start_s - start_s).max(0.0),
            end_s: (e.end_s.min(end_s) - start_s).max(0.0),
            text: e.text.clone(),
        })
        .filter(|e| e.duration_s() > 0.05)
        .collect()
}

/// Vertical placement of the caption block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    #[default]
    Bottom,
    Center,
    Top,
}

/// Caption reveal animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionAnimation {
    #[default]
    None,
    /// One dialogue line per word with the active word highlighted
    WordByWord,
    /// Scale-in pop per cue
    Pop,
}

/// Overlay stylesheet rendered per clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStyle {
    pub font_name: String,
    pub font_size: u32,
    /// `&HAABBGGRR` ASS color
    pub primary_color: String,
    pub outline_color: String,
    pub background_color: String,
    pub bold: bool,
    pub outline: u32,
    pub shadow: u32,
    #[serde(default)]
    pub position: CaptionPosition,
    #[serde(default)]
    pub animation: CaptionAnimation,
}

/// Named caption presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPreset {
    #[default]
    Classic,
    Tiktok,
    Minimal,
    BoldPop,
    /// Captions disabled
    Off,
}

impl CaptionPreset {
    /// Resolve the preset into a concrete style, `None` for `Off`.
    pub fn style(&self) -> Option<CaptionStyle> {
        match self {
            CaptionPreset::Off => None,
            CaptionPreset::Classic => Some(CaptionStyle {
                font_name: "Arial".to_string(),
                font_size: 52,
                primary_color: "&H00FFFFFF".to_string(),
                outline_color: "&H00000000".to_string(),
                background_color: "&H80000000".to_string(),
                bold: true,
                outline: 3,
                shadow: 1,
                position: CaptionPosition::Bottom,
                animation: CaptionAnimation::None,
            }),
            CaptionPreset::Tiktok => Some(CaptionStyle {
                font_name: "Montserrat".to_string(),
                font_size: 58,
                primary_color: "&H00FFFFFF".to_string(),
                outline_color: "&H00000000".to_string(),
                background_color: "&H00000000".to_string(),
                bold: true,
                outline: 4,
                shadow: 0,
                position: CaptionPosition::Center,
                animation: CaptionAnimation::WordByWord,
            }),
            CaptionPreset::Minimal => Some(CaptionStyle {
                font_name: "Helvetica".to_string(),
                font_size: 44,
                primary_color: "&H00FFFFFF".to_string(),
                outline_color: "&H00333333".to_string(),
                background_color: "&H00000000".to_string(),
                bold: false,
                outline: 1,
                shadow: 0,
                position: CaptionPosition::Bottom,
                animation: CaptionAnimation::None,
            }),
            CaptionPreset::BoldPop => Some(CaptionStyle {
                font_name: "Impact".to_string(),
                font_size: 64,
                primary_color: "&H0000FFFF".to_string(),
                outline_color: "&H00000000".to_string(),
                background_color: "&H00000000".to_string(),
                bold: true,
                outline: 4,
                shadow: 2,
                position: CaptionPosition::Center,
                animation: CaptionAnimation::Pop,
            }),
        }
    }
}

impl FromStr for CaptionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(CaptionPreset::Classic),
            "tiktok" => Ok(CaptionPreset::Tiktok),
            "minimal" => Ok(CaptionPreset::Minimal),
            "bold_pop" => Ok(CaptionPreset::BoldPop),
            "off" => Ok(CaptionPreset::Off),
            other => Err(format!("unknown caption preset: {}", other)),
        }
    }
}
