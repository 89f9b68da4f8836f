//! Analysis orchestration: probes → fusion → detection → boundary
//! optimization → virality annotation.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use clipforge_media::probes::{
    audio::audio_energy_probe, comments::comment_timestamp_probe, heatmap::heatmap_probe,
    scene::scene_change_probe, AUDIO_WEIGHT, COMMENTS_WEIGHT, HEATMAP_WEIGHT, PROBE_WINDOW_S,
    SCENE_WEIGHT,
};
use clipforge_media::{detect_silences, FfmpegRunner};
use clipforge_models::{
    CombinedHeatmap, CommentMoment, Quality, Segment, SignalMethod, SignalSource, VideoMeta,
    ViralityBreakdown,
};
use clipforge_signals::{
    combine_signals, detect_segments, optimize_boundaries, score_segment, BoundaryOptions,
    CombineOptions, DetectorOptions, SilenceInterval,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Detection settings accepted from clients; unset fields use defaults.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeSettings {
    pub top_n: Option<usize>,
    pub min_duration_s: Option<f64>,
    pub max_duration_s: Option<f64>,
    pub min_gap_s: Option<f64>,
    pub intensity_threshold: Option<f64>,
}

impl AnalyzeSettings {
    pub fn detector_options(&self) -> DetectorOptions {
        let defaults = DetectorOptions::default();
        DetectorOptions {
            top_n: self.top_n.unwrap_or(defaults.top_n),
            min_duration_s: self.min_duration_s.unwrap_or(defaults.min_duration_s),
            max_duration_s: self.max_duration_s.unwrap_or(defaults.max_duration_s),
            min_gap_s: self.min_gap_s.unwrap_or(defaults.min_gap_s),
            intensity_threshold: self
                .intensity_threshold
                .unwrap_or(defaults.intensity_threshold),
        }
    }

    fn validate(&self) -> WorkerResult<()> {
        let opts = self.detector_options();
        if opts.top_n == 0 || opts.top_n > 20 {
            return Err(WorkerError::invalid_input("topN must be in 1..=20"));
        }
        if opts.min_duration_s <= 0.0 || opts.min_duration_s > opts.max_duration_s {
            return Err(WorkerError::invalid_input(
                "duration bounds must satisfy 0 < min <= max",
            ));
        }
        if !(0.0..=1.0).contains(&opts.intensity_threshold) {
            return Err(WorkerError::invalid_input(
                "intensityThreshold must be in 0..=1",
            ));
        }
        Ok(())
    }
}

/// Everything an analyze request reports back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub video: VideoMeta,
    pub heatmap: CombinedHeatmap,
    pub segments: Vec<Segment>,
    pub detection: clipforge_models::DetectionSummary,
    pub virality_scores: HashMap<String, ViralityBreakdown>,
    pub comment_moments: Vec<CommentMoment>,
}

/// Run the full analysis pipeline for a URL.
pub async fn analyze_url(
    url: &str,
    settings: &AnalyzeSettings,
    config: &WorkerConfig,
    cancel: Option<watch::Receiver<bool>>,
) -> WorkerResult<AnalysisReport> {
    settings.validate()?;
    if !clipforge_media::is_supported_url(url) {
        return Err(WorkerError::invalid_input(format!("unsupported URL: {}", url)));
    }

    let fetched = clipforge_media::fetch_metadata(url, config.max_comments, cancel.clone())
        .await
        .map_err(|e| match e {
            clipforge_media::MediaError::YtDlpNotFound => {
                WorkerError::Upstream("downloader missing".to_string())
            }
            clipforge_media::MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Upstream(other.to_string()),
        })?;
    let meta = fetched.meta;
    let duration_ms = (meta.duration_s * 1000.0) as u64;

    // The comment probe runs first; it needs no media download
    let comment_signal = comment_timestamp_probe(&fetched.comments, meta.duration_s);

    let mut sources: Vec<SignalSource> = Vec::new();
    let mut silences: Vec<SilenceInterval> = Vec::new();
    let mut analysis_file: Option<PathBuf> = None;

    let heatmap_points = heatmap_probe(&meta.heatmap);
    if !heatmap_points.is_empty() {
        // A provider heatmap stands alone
        sources.push(SignalSource::new(
            SignalMethod::Heatmap,
            HEATMAP_WEIGHT,
            heatmap_points,
        ));
        info!(video_id = %meta.id, "using provider engagement heatmap");
    } else {
        // Fallback analysis: one download, then audio and scene in parallel
        if comment_signal.is_strong() {
            info!(
                buckets = comment_signal.points.len(),
                "strong comment signal backing the fallback analysis"
            );
        }

        let video_path = config.temp_dir.join(format!("analysis_{}.mp4", meta.id));
        tokio::fs::create_dir_all(&config.temp_dir).await?;

        match clipforge_media::download_video(url, Quality::Q480, &video_path, cancel.clone()).await
        {
            Ok(()) => {
                let audio_runner = make_runner(config, cancel.clone());
                let scene_runner = make_runner(config, cancel.clone());

                let (audio_points, scene_points) = tokio::join!(
                    audio_energy_probe(&video_path, meta.duration_s, PROBE_WINDOW_S, &audio_runner),
                    scene_change_probe(&video_path, meta.duration_s, PROBE_WINDOW_S, scene_runner),
                );

                if !audio_points.is_empty() {
                    sources.push(SignalSource::new(SignalMethod::Audio, AUDIO_WEIGHT, audio_points));
                }
                if !scene_points.is_empty() {
                    sources.push(SignalSource::new(SignalMethod::Scene, SCENE_WEIGHT, scene_points));
                }

                // Silence intervals feed the boundary optimizer
                let silence_runner = make_runner(config, cancel.clone());
                match detect_silences(&video_path, &silence_runner).await {
                    Ok(spans) => {
                        silences = spans
                            .iter()
                            .map(|s| SilenceInterval { start_s: s.start_s, end_s: s.end_s })
                            .collect();
                    }
                    Err(e) => warn!(error = %e, "silence detection failed, boundaries use energy only"),
                }

                analysis_file = Some(video_path);
            }
            Err(clipforge_media::MediaError::Cancelled) => return Err(WorkerError::Cancelled),
            Err(e) => {
                warn!(error = %e, "analysis download failed, continuing with comment signal only");
            }
        }

        if !comment_signal.points.is_empty() {
            sources.push(SignalSource::new(
                SignalMethod::Comments,
                COMMENTS_WEIGHT,
                comment_signal.points.clone(),
            ));
        }
    }

    let heatmap = combine_signals(sources, duration_ms, &CombineOptions::default());
    let detector_opts = settings.detector_options();
    let detection = detect_segments(&heatmap, meta.duration_s, &detector_opts);

    let boundary_opts = BoundaryOptions {
        min_duration_s: detector_opts.min_duration_s,
        max_duration_s: detector_opts.max_duration_s,
    };
    let segments = optimize_boundaries(
        detection.segments,
        &heatmap,
        &silences,
        meta.duration_s,
        &boundary_opts,
    );

    let virality_scores: HashMap<String, ViralityBreakdown> = segments
        .iter()
        .map(|seg| {
            (
                seg.id.to_string(),
                score_segment(seg, &heatmap, meta.duration_s),
            )
        })
        .collect();

    // Analysis artifacts are request-scoped
    if let Some(path) = analysis_file {
        tokio::fs::remove_file(&path).await.ok();
    }

    let primary = heatmap
        .primary_method()
        .unwrap_or(SignalMethod::Comments);

    info!(
        video_id = %meta.id,
        segments = segments.len(),
        primary = %primary,
        threshold = detection.threshold_used,
        "analysis complete"
    );

    Ok(AnalysisReport {
        detection: clipforge_models::DetectionSummary {
            primary,
            methods_used: heatmap.methods_used.clone(),
            threshold_used: detection.threshold_used,
            relaxed: detection.relaxed,
        },
        video: meta,
        heatmap,
        segments,
        virality_scores,
        comment_moments: comment_signal.moments,
    })
}

fn make_runner(config: &WorkerConfig, cancel: Option<watch::Receiver<bool>>) -> FfmpegRunner {
    let mut runner = FfmpegRunner::new().with_timeout(config.analysis_timeout);
    if let Some(rx) = cancel {
        runner = runner.with_cancel(rx);
    }
    runner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let opts = AnalyzeSettings::default().detector_options();
        assert_eq!(opts.top_n, 5);
        assert!((opts.intensity_threshold - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_settings_validation() {
        let ok = AnalyzeSettings {
            top_n: Some(3),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let zero_n = AnalyzeSettings {
            top_n: Some(0),
            ..Default::default()
        };
        assert!(zero_n.validate().is_err());

        let inverted = AnalyzeSettings {
            min_duration_s: Some(90.0),
            max_duration_s: Some(30.0),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let bad_threshold = AnalyzeSettings {
            intensity_threshold: Some(1.4),
            ..Default::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[tokio::test]
    async fn test_unsupported_url_rejected() {
        let err = analyze_url(
            "https://example.com/file.mp4",
            &AnalyzeSettings::default(),
            &WorkerConfig::default(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidInput(_)));
    }

    #[test]
    fn test_settings_deserialize_camel_case() {
        let settings: AnalyzeSettings =
            serde_json::from_str(r#"{"topN": 3, "minGapS": 20.0}"#).unwrap();
        assert_eq!(settings.top_n, Some(3));
        assert_eq!(settings.min_gap_s, Some(20.0));
    }
}
