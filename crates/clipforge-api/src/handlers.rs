//! HTTP request handlers over the analysis pipeline, orchestrator and hub.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tracing::info;

use clipforge_models::captions::slice_subtitles;
use clipforge_models::{JobId, JobProgress, Segment, SubtitleEntry};
use clipforge_worker::{AnalysisReport, AnalyzeSettings, BatchJobSpec, CutJobSpec};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /api/analyze`
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
    #[serde(default)]
    pub settings: AnalyzeSettings,
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisReport>> {
    info!(url = %request.url, "analyze request");
    let report = clipforge_worker::analyze_url(
        &request.url,
        &request.settings,
        &state.worker_config,
        None,
    )
    .await?;
    Ok(Json(report))
}

/// `POST /api/subtitles`
#[derive(Debug, Deserialize)]
pub struct SubtitlesRequest {
    pub url: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Serialize)]
pub struct SubtitlesResponse {
    pub subtitles: HashMap<String, Vec<SubtitleEntry>>,
}

pub async fn subtitles(
    State(state): State<AppState>,
    Json(request): Json<SubtitlesRequest>,
) -> ApiResult<Json<SubtitlesResponse>> {
    if request.segments.is_empty() {
        return Err(ApiError::bad_request("no segments given"));
    }
    if !clipforge_media::is_supported_url(&request.url) {
        return Err(ApiError::bad_request(format!(
            "unsupported URL: {}",
            request.url
        )));
    }

    let workdir = state
        .worker_config
        .temp_dir
        .join(format!("subs_{}", clipforge_worker::derive_video_id(&request.url)));
    let full = clipforge_media::fetch_subtitles(&request.url, &workdir, None)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    tokio::fs::remove_dir_all(&workdir).await.ok();

    let subtitles = request
        .segments
        .iter()
        .map(|seg| {
            (
                seg.id.to_string(),
                slice_subtitles(&full, seg.start_s, seg.end_s),
            )
        })
        .collect();

    Ok(Json(SubtitlesResponse { subtitles }))
}

/// `POST /api/cut`
#[derive(Debug, Serialize)]
pub struct CutResponse {
    #[serde(rename = "jobId")]
    pub job_id: JobId,
}

pub async fn cut(
    State(state): State<AppState>,
    Json(spec): Json<CutJobSpec>,
) -> ApiResult<Json<CutResponse>> {
    info!(url = %spec.url, segments = spec.segments.len(), "cut request");
    let job_id = state.worker.submit_cut(spec).await?;
    Ok(Json(CutResponse { job_id }))
}

/// `GET /api/jobs/{id}`
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub progress: JobProgress,
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job_id = JobId::from_string(id);
    let progress = state.hub.latest(&job_id).await?;
    Ok(Json(JobResponse { id: job_id, progress }))
}

/// `GET /api/jobs/{id}/progress` — server-push progress stream.
///
/// One JSON `JobProgress` per event; the terminal event is the last frame
/// before the stream closes.
pub async fn job_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job_id = JobId::from_string(id);
    let rx = state.hub.attach(&job_id).await?;

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let progress = rx.recv().await?;
        let event = match serde_json::to_string(&progress) {
            Ok(json) => Event::default().data(json),
            Err(_) => return None,
        };
        Some((Ok(event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `POST /api/jobs/{id}/cancel`
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let job_id = JobId::from_string(id);
    state.hub.cancel(&job_id).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

/// `POST /api/batch`
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(rename = "batchId")]
    pub batch_id: JobId,
    #[serde(rename = "totalUrls")]
    pub total_urls: usize,
}

pub async fn batch(
    State(state): State<AppState>,
    Json(spec): Json<BatchJobSpec>,
) -> ApiResult<Json<BatchResponse>> {
    info!(urls = spec.urls.len(), "batch request");
    let (batch_id, total_urls) = state.worker.submit_batch(spec).await?;
    Ok(Json(BatchResponse { batch_id, total_urls }))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
