//! Virality score breakdowns.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label bucket for an overall virality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViralityLabel {
    Viral,
    Strong,
    Good,
    Fair,
}

impl ViralityLabel {
    /// Bucket an overall score: >=80 Viral, >=60 Strong, >=40 Good, else Fair.
    pub fn for_score(overall: u32) -> Self {
        match overall {
            80.. => ViralityLabel::Viral,
            60..=79 => ViralityLabel::Strong,
            40..=59 => ViralityLabel::Good,
            _ => ViralityLabel::Fair,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViralityLabel::Viral => "Viral",
            ViralityLabel::Strong => "Strong",
            ViralityLabel::Good => "Good",
            ViralityLabel::Fair => "Fair",
        }
    }

    /// UI color associated with the label.
    pub fn color(&self) -> &'static str {
        match self {
            ViralityLabel::Viral => "red",
            ViralityLabel::Strong => "green",
            ViralityLabel::Good => "amber",
            ViralityLabel::Fair => "gray",
        }
    }
}

/// Weighted composite virality score for one segment.
///
/// Every sub-score is an integer in 0..100; `overall` is the weighted,
/// integer-rounded combination.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViralityBreakdown {
    pub overall: u32,
    pub peak_intensity: u32,
    pub hook_strength: u32,
    pub pacing: u32,
    pub audio_energy: u32,
    pub position_bonus: u32,
    pub duration_fit: u32,
    pub label: String,
    pub color: String,
}

impl ViralityBreakdown {
    /// Assemble a breakdown from sub-scores, computing `overall` and labels.
    ///
    /// Weights: peak 0.30, hook 0.25, pacing 0.15, audio 0.15,
    /// position 0.10, duration 0.05.
    pub fn from_sub_scores(
        peak_intensity: u32,
        hook_strength: u32,
        pacing: u32,
        audio_energy: u32,
        position_bonus: u32,
        duration_fit: u32,
    ) -> Self {
        let overall = (0.30 * peak_intensity as f64
            + 0.25 * hook_strength as f64
            + 0.15 * pacing as f64
            + 0.15 * audio_energy as f64
            + 0.10 * position_bonus as f64
            + 0.05 * duration_fit as f64)
            .round() as u32;
        let label = ViralityLabel::for_score(overall);

        Self {
            overall,
            peak_intensity,
            hook_strength,
            pacing,
            audio_energy,
            position_bonus,
            duration_fit,
            label: label.as_str().to_string(),
            color: label.color().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_buckets() {
        assert_eq!(ViralityLabel::for_score(95), ViralityLabel::Viral);
        assert_eq!(ViralityLabel::for_score(80), ViralityLabel::Viral);
        assert_eq!(ViralityLabel::for_score(79), ViralityLabel::Strong);
        assert_eq!(ViralityLabel::for_score(60), ViralityLabel::Strong);
        assert_eq!(ViralityLabel::for_score(40), ViralityLabel::Good);
        assert_eq!(ViralityLabel::for_score(39), ViralityLabel::Fair);
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let b = ViralityBreakdown::from_sub_scores(100, 100, 100, 100, 100, 100);
        assert_eq!(b.overall, 100);
        assert_eq!(b.label, "Viral");
        assert_eq!(b.color, "red");

        let b = ViralityBreakdown::from_sub_scores(0, 0, 0, 0, 0, 0);
        assert_eq!(b.overall, 0);
        assert_eq!(b.label, "Fair");
    }

    #[test]
    fn test_overall_rounding() {
        // 0.30*50 + 0.25*50 + 0.15*50 + 0.15*50 + 0.10*50 + 0.05*50 = 50
        let b = ViralityBreakdown::from_sub_scores(50, 50, 50, 50, 50, 50);
        assert_eq!(b.overall, 50);
    }
}
