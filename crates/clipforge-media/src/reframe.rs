//! Content-aware reframe analysis.
//!
//! Samples frames from the fetched clip, scores five equal-width vertical
//! strips per frame on brightness and saturation with a slight central
//! bias, picks the best contiguous 3-strip window, and smooths the
//! resulting crop trajectory. Sources that are already vertical get a
//! static center crop.

use std::path::Path;

use tracing::{debug, warn};

use clipforge_models::{CropKeyframe, CropPlan};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Frame sampling rate.
const SAMPLE_FPS: f64 = 2.0;

/// Analysis frame width; small frames keep strip scoring cheap.
const SAMPLE_WIDTH: u32 = 320;

/// Number of vertical strips per frame.
const STRIP_COUNT: usize = 5;

/// Contiguous strips forming a crop window.
const WINDOW_STRIPS: usize = 3;

/// Centered smoothing window over per-frame crop positions.
const SMOOTH_FRAMES: usize = 5;

/// Keyframe cap so dynamic crop expressions stay bounded.
const MAX_KEYFRAMES: usize = 24;

/// Central bias multipliers per strip.
const CENTER_BIAS: [f64; STRIP_COUNT] = [1.0, 1.06, 1.12, 1.06, 1.0];

/// Analyze the clip and produce a crop plan for smart reframing.
///
/// `source_w`/`source_h` are the fetched artifact's dimensions; vertical
/// sources short-circuit to a centered static crop.
pub async fn analyze_reframe(
    input: &Path,
    offset_s: f64,
    duration_s: f64,
    source_w: u32,
    source_h: u32,
    temp_dir: &Path,
    runner: &FfmpegRunner,
) -> MediaResult<CropPlan> {
    if source_w > 0 && source_h as f64 / source_w as f64 >= 16.0 / 9.0 {
        debug!("source already vertical, using static center crop");
        return Ok(CropPlan::centered());
    }

    let frames_dir = temp_dir.join("reframe_frames");
    tokio::fs::create_dir_all(&frames_dir).await?;

    let pattern = frames_dir.join("frame_%04d.jpg");
    let cmd = FfmpegCommand::new(input, &pattern)
        .seek(offset_s)
        .duration(duration_s)
        .video_filter(format!("fps={},scale={}:-2", SAMPLE_FPS, SAMPLE_WIDTH))
        .output_args(["-q:v", "5"]);
    runner.run(&cmd).await?;

    let mut frame_paths: Vec<_> = std::fs::read_dir(&frames_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jpg"))
        .collect();
    frame_paths.sort();

    if frame_paths.is_empty() {
        return Err(MediaError::internal("no frames sampled for reframe analysis"));
    }

    // Frames score independently; fan the CPU-bound decoding out across
    // blocking threads
    let mut tasks = tokio::task::JoinSet::new();
    for (index, path) in frame_paths.into_iter().enumerate() {
        tasks.spawn_blocking(move || (index, score_frame(&path)));
    }
    let mut scored: Vec<(usize, f64)> = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let pair =
            result.map_err(|e| MediaError::internal(format!("reframe scoring task failed: {}", e)))?;
        scored.push(pair);
    }
    scored.sort_by_key(|(index, _)| *index);
    let centers: Vec<f64> = scored.into_iter().map(|(_, center)| center).collect();

    let smoothed = smooth_centers(&centers, SMOOTH_FRAMES);
    let crop_width_frac = crop_width_fraction(source_w, source_h);
    let keyframes = build_keyframes(&smoothed, crop_width_frac);

    tokio::fs::remove_dir_all(&frames_dir).await.ok();

    debug!(
        frames = centers.len(),
        keyframes = keyframes.len(),
        "reframe analysis complete"
    );

    Ok(CropPlan::Dynamic { keyframes }.simplified())
}

/// Score one sampled frame and return the chosen crop-center fraction.
///
/// Decode failures fall back to the frame center rather than aborting the
/// whole analysis.
fn score_frame(path: &Path) -> f64 {
    match image::open(path) {
        Ok(img) => best_window_center(&strip_scores(&img.to_rgb8())),
        Err(e) => {
            warn!(frame = %path.display(), error = %e, "failed to decode sampled frame");
            0.5
        }
    }
}

/// Brightness + saturation score per vertical strip, with central bias.
fn strip_scores(frame: &image::RgbImage) -> [f64; STRIP_COUNT] {
    let (width, height) = frame.dimensions();
    let strip_width = (width as usize / STRIP_COUNT).max(1) as u32;

    let mut scores = [0.0f64; STRIP_COUNT];
    for (strip, score) in scores.iter_mut().enumerate() {
        let x0 = strip as u32 * strip_width;
        let x1 = if strip == STRIP_COUNT - 1 {
            width
        } else {
            (x0 + strip_width).min(width)
        };

        let mut brightness = 0.0f64;
        let mut saturation = 0.0f64;
        let mut pixels = 0usize;

        // Sample a pixel grid rather than every pixel
        for y in (0..height).step_by(4) {
            for x in (x0..x1).step_by(4) {
                let [r, g, b] = frame.get_pixel(x, y).0;
                let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
                let max = r.max(g).max(b);
                let min = r.min(g).min(b);
                brightness += 0.299 * r + 0.587 * g + 0.114 * b;
                saturation += max - min;
                pixels += 1;
            }
        }

        if pixels > 0 {
            let brightness = brightness / pixels as f64;
            let saturation = saturation / pixels as f64;
            *score = (0.6 * brightness + 0.4 * saturation) * CENTER_BIAS[strip];
        }
    }
    scores
}

/// Center fraction of the best contiguous 3-strip window.
fn best_window_center(scores: &[f64; STRIP_COUNT]) -> f64 {
    let mut best_start = 0usize;
    let mut best_score = f64::NEG_INFINITY;
    for start in 0..=(STRIP_COUNT - WINDOW_STRIPS) {
        let score: f64 = scores[start..start + WINDOW_STRIPS].iter().sum();
        if score > best_score {
            best_score = score;
            best_start = start;
        }
    }
    (best_start as f64 + WINDOW_STRIPS as f64 / 2.0) / STRIP_COUNT as f64
}

/// Centered moving average over per-frame centers.
fn smooth_centers(centers: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..centers.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(centers.len());
            centers[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

/// Width of the 9:16 crop window as a fraction of source width.
fn crop_width_fraction(source_w: u32, source_h: u32) -> f64 {
    if source_w == 0 || source_h == 0 {
        return 9.0 / 16.0;
    }
    ((source_h as f64 * 9.0 / 16.0) / source_w as f64).min(1.0)
}

/// Turn smoothed centers into crop-left keyframes, thinned to the cap.
fn build_keyframes(centers: &[f64], crop_width_frac: f64) -> Vec<CropKeyframe> {
    let stride = centers.len().div_ceil(MAX_KEYFRAMES).max(1);
    let mut keyframes: Vec<CropKeyframe> = centers
        .iter()
        .enumerate()
        .filter(|(i, _)| i % stride == 0)
        .map(|(i, &center)| CropKeyframe {
            time_s: i as f64 / SAMPLE_FPS,
            x_frac: (center - crop_width_frac / 2.0).clamp(0.0, 1.0 - crop_width_frac),
        })
        .collect();

    // Keep the final frame so the trajectory covers the whole clip
    if let Some((last_idx, &last_center)) = centers.iter().enumerate().last() {
        if last_idx % stride != 0 {
            keyframes.push(CropKeyframe {
                time_s: last_idx as f64 / SAMPLE_FPS,
                x_frac: (last_center - crop_width_frac / 2.0).clamp(0.0, 1.0 - crop_width_frac),
            });
        }
    }
    keyframes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_window_prefers_bright_side() {
        // Right side clearly hotter: windows are [0..3), [1..4), [2..5)
        let scores = [0.1, 0.1, 0.3, 0.9, 0.9];
        let center = best_window_center(&scores);
        assert!((center - 0.7).abs() < 1e-9); // strips 2..5 → center 3.5/5
    }

    #[test]
    fn test_best_window_center_frame() {
        let scores = [0.2, 0.8, 0.9, 0.8, 0.2];
        let center = best_window_center(&scores);
        assert!((center - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_smooth_centers_dampens_jitter() {
        let jittery = [0.3, 0.7, 0.3, 0.7, 0.3];
        let smoothed = smooth_centers(&jittery, 5);
        for v in &smoothed {
            assert!((*v - 0.46).abs() < 0.1, "smoothed value {} still jittery", v);
        }
    }

    #[test]
    fn test_crop_width_fraction_for_landscape() {
        // 1920x1080 → crop width 607.5 px → 0.3164 of the width
        let frac = crop_width_fraction(1920, 1080);
        assert!((frac - 0.3164).abs() < 0.001);
    }

    #[test]
    fn test_keyframes_thinned_and_clamped() {
        let centers = vec![0.5; 200];
        let keyframes = build_keyframes(&centers, 0.3164);

        assert!(keyframes.len() <= MAX_KEYFRAMES + 1);
        for k in &keyframes {
            assert!(k.x_frac >= 0.0 && k.x_frac <= 1.0 - 0.3164 + 1e-9);
        }
        // Last frame kept
        let last = keyframes.last().unwrap();
        assert!((last.time_s - 199.0 / SAMPLE_FPS).abs() < 1e-9);
    }

    #[test]
    fn test_static_plan_for_still_content() {
        let centers = vec![0.5; 40];
        let plan = CropPlan::Dynamic {
            keyframes: build_keyframes(&centers, 0.3164),
        }
        .simplified();
        assert!(matches!(plan, CropPlan::Static { .. }));
    }

    #[test]
    fn test_synthetic_frame_scoring() {
        // Build a frame with a bright, saturated right edge.
        let mut img = image::RgbImage::new(100, 60);
        for y in 0..60 {
            for x in 0..100 {
                let p = if x >= 80 { [255u8, 40, 40] } else { [20u8, 20, 20] };
                img.put_pixel(x, y, image::Rgb(p));
            }
        }
        let scores = strip_scores(&img);
        assert!(
            scores[4] > scores[0],
            "right strip should outscore left: {:?}",
            scores
        );
        let center = best_window_center(&scores);
        assert!(center > 0.5);
    }
}
