//! Comment-timestamp probe.
//!
//! Viewers pointing at moments ("2:30 is gold") are a strong engagement
//! signal that needs no media download. Timestamp tokens are parsed out of
//! comment texts, bucketed, and normalized; the ranked moment list is kept
//! for explainability.

use regex::Regex;
use tracing::debug;

use clipforge_models::{CommentMoment, IntensityPoint};

use crate::probes::normalize_intensities;

/// Bucket width for comment mentions, seconds.
pub const COMMENT_BUCKET_S: f64 = 5.0;

/// Mentions past `duration + 5 s` are parser noise and rejected.
const OVERSHOOT_TOLERANCE_S: f64 = 5.0;

/// A comment signal needs at least this many distinct buckets to stand on
/// its own.
const STRONG_SIGNAL_BUCKETS: usize = 5;

/// Sample text length cap for moments.
const SAMPLE_TEXT_LEN: usize = 120;

/// Parsed comment signal.
#[derive(Debug, Clone, Default)]
pub struct CommentSignal {
    /// Non-empty buckets only, normalized to `[0, 1]`
    pub points: Vec<IntensityPoint>,
    /// Buckets ranked by mention count, descending
    pub moments: Vec<CommentMoment>,
}

impl CommentSignal {
    /// At least five distinct buckets carry mentions.
    pub fn is_strong(&self) -> bool {
        self.points.len() >= STRONG_SIGNAL_BUCKETS
    }
}

/// Extract timestamp mentions from comment texts.
pub fn comment_timestamp_probe(comments: &[String], duration_s: f64) -> CommentSignal {
    let re = Regex::new(r"\b(\d{1,2}):(\d{2})(?::(\d{2}))?\b").expect("static regex");

    // bucket index -> (count, first sample text)
    let mut buckets: std::collections::BTreeMap<u64, (u32, String)> =
        std::collections::BTreeMap::new();

    for comment in comments {
        for caps in re.captures_iter(comment) {
            let Some(time_s) = token_to_seconds(&caps) else {
                continue;
            };
            if duration_s > 0.0 && time_s > duration_s + OVERSHOOT_TOLERANCE_S {
                continue;
            }

            let bucket = (time_s / COMMENT_BUCKET_S) as u64;
            let entry = buckets
                .entry(bucket)
                .or_insert_with(|| (0, truncate(comment, SAMPLE_TEXT_LEN)));
            entry.0 += 1;
        }
    }

    if buckets.is_empty() {
        return CommentSignal::default();
    }

    let mut points: Vec<IntensityPoint> = buckets
        .iter()
        .map(|(&bucket, &(count, _))| {
            let start_ms = (bucket as f64 * COMMENT_BUCKET_S * 1000.0) as u64;
            let end_ms = start_ms + (COMMENT_BUCKET_S * 1000.0) as u64;
            IntensityPoint::new(start_ms, end_ms, count as f64)
        })
        .collect();
    normalize_intensities(&mut points);

    let mut moments: Vec<CommentMoment> = buckets
        .into_iter()
        .map(|(bucket, (count, sample_text))| CommentMoment {
            time_s: bucket as f64 * COMMENT_BUCKET_S,
            count,
            sample_text,
        })
        .collect();
    moments.sort_by(|a, b| b.count.cmp(&a.count));

    debug!(
        buckets = points.len(),
        top_count = moments.first().map(|m| m.count).unwrap_or(0),
        "comment probe complete"
    );

    CommentSignal { points, moments }
}

/// Convert a regex match into seconds; the first group is minutes for
/// `m:ss` and hours for `h:mm:ss`.
fn token_to_seconds(caps: &regex::Captures<'_>) -> Option<f64> {
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    if second >= 60 {
        return None;
    }

    match caps.get(3) {
        Some(third) => {
            let third: u32 = third.as_str().parse().ok()?;
            if second >= 60 || third >= 60 {
                return None;
            }
            Some((first * 3600 + second * 60 + third) as f64)
        }
        None => Some((first * 60 + second) as f64),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
