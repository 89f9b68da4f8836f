//! Video acquisition through yt-dlp.
//!
//! Covers metadata + engagement-heatmap + comment dumps, full downloads,
//! partial (section) downloads with unsupported-source detection, and
//! full-video subtitle fetches.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use clipforge_models::{HeatmapMarker, Quality, SubtitleEntry, VideoMeta};

use crate::error::{MediaError, MediaResult};

/// Deadline for metadata dumps.
const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for subtitle fetches.
const SUBTITLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for full and partial downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Check if a URL belongs to a supported video platform.
pub fn is_supported_url(url: &str) -> bool {
    let supported = [
        "youtube.com",
        "youtu.be",
        "vimeo.com",
        "twitch.tv",
        "tiktok.com",
        "x.com",
        "twitter.com",
    ];
    (url.starts_with("http://") || url.starts_with("https://"))
        && supported.iter().any(|domain| url.contains(domain))
}

/// Metadata dump plus raw comment texts.
#[derive(Debug, Clone)]
pub struct FetchedMeta {
    pub meta: VideoMeta,
    pub comments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InfoDump {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    heatmap: Vec<HeatmapMarker>,
    #[serde(default)]
    comments: Vec<CommentDump>,
}

#[derive(Debug, Deserialize)]
struct CommentDump {
    text: Option<String>,
}

/// Fetch metadata, the provider engagement heatmap and up to
/// `max_comments` comments in one downloader dump, without downloading
/// any media.
pub async fn fetch_metadata(
    url: &str,
    max_comments: usize,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<FetchedMeta> {
    let comment_args = format!("youtube:max_comments={};comment_sort=top", max_comments);
    let output = run_ytdlp(
        &[
            "--dump-single-json",
            "--skip-download",
            "--write-comments",
            "--extractor-args",
            &comment_args,
            url,
        ],
        METADATA_TIMEOUT,
        cancel,
    )
    .await?;

    let dump: InfoDump = serde_json::from_slice(&output.stdout)?;
    let meta = VideoMeta {
        id: dump.id.unwrap_or_else(|| "unknown".to_string()),
        title: dump.title.unwrap_or_else(|| "Untitled".to_string()),
        duration_s: dump.duration.unwrap_or(0.0),
        width: dump.width.unwrap_or(0),
        height: dump.height.unwrap_or(0),
        heatmap: dump.heatmap,
    };
    let comments: Vec<String> = dump
        .comments
        .into_iter()
        .filter_map(|c| c.text)
        .take(max_comments)
        .collect();

    info!(
        video_id = %meta.id,
        duration_s = meta.duration_s,
        heatmap_points = meta.heatmap.len(),
        comments = comments.len(),
        "fetched video metadata"
    );

    Ok(FetchedMeta { meta, comments })
}

/// Download the whole video at the quality's resolution cap.
pub async fn download_video(
    url: &str,
    quality: Quality,
    output_path: impl AsRef<Path>,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();

    if output_path.exists() {
        info!(path = %output_path.display(), "reusing existing download");
        return Ok(());
    }

    let format = format_selector(quality);
    let output_str = output_path.to_string_lossy().to_string();
    run_ytdlp(
        &["-f", &format, "-o", &output_str, url],
        DOWNLOAD_TIMEOUT,
        cancel,
    )
    .await?;

    if !output_path.exists() {
        return Err(MediaError::download_failed("output file not created"));
    }

    let size = output_path.metadata()?.len();
    info!(
        path = %output_path.display(),
        size_mb = size as f64 / (1024.0 * 1024.0),
        "downloaded video"
    );
    Ok(())
}

/// Download only `[start_s, end_s]` of the video.
///
/// Returns [`MediaError::PartialFetchUnsupported`] when the source rejects
/// section downloads so the caller can fall back to a full download.
pub async fn download_section(
    url: &str,
    start_s: f64,
    end_s: f64,
    quality: Quality,
    output_path: impl AsRef<Path>,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    let section = format!("*{:.0}-{:.0}", start_s, end_s);
    let format = format_selector(quality);
    let output_str = output_path.to_string_lossy().to_string();

    info!(
        start_s = start_s,
        end_s = end_s,
        path = %output_path.display(),
        "attempting partial fetch"
    );

    let result = run_ytdlp(
        &[
            "--download-sections",
            &section,
            "--force-keyframes-at-cuts",
            "-f",
            &format,
            "-o",
            &output_str,
            url,
        ],
        DOWNLOAD_TIMEOUT,
        cancel,
    )
    .await;

    match result {
        Ok(_) => {
            if !output_path.exists() {
                return Err(MediaError::download_failed("section output not created"));
            }
            Ok(())
        }
        Err(MediaError::DownloadFailed { message }) if is_section_rejection(&message) => {
            warn!(reason = %message, "source rejected partial fetch");
            Err(MediaError::PartialFetchUnsupported(message))
        }
        Err(e) => Err(e),
    }
}

/// Fetch full-video subtitles (uploaded first, auto-generated fallback)
/// and parse them into clip-independent entries.
pub async fn fetch_subtitles(
    url: &str,
    workdir: impl AsRef<Path>,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<Vec<SubtitleEntry>> {
    let workdir = workdir.as_ref();
    tokio::fs::create_dir_all(workdir).await?;
    let template = workdir.join("subs.%(ext)s");
    let template_str = template.to_string_lossy().to_string();

    run_ytdlp(
        &[
            "--skip-download",
            "--write-subs",
            "--write-auto-subs",
            "--sub-langs",
            "en.*,en",
            "--sub-format",
            "vtt",
            "-o",
            &template_str,
            url,
        ],
        SUBTITLE_TIMEOUT,
        cancel,
    )
    .await?;

    // yt-dlp inserts the language between the template stem and extension
    let mut vtt_path = None;
    let mut dir = tokio::fs::read_dir(workdir).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "vtt") {
            vtt_path = Some(path);
            break;
        }
    }

    let Some(vtt_path) = vtt_path else {
        debug!("no subtitle track available");
        return Ok(Vec::new());
    };

    let content = tokio::fs::read_to_string(&vtt_path).await?;
    let entries = parse_vtt(&content);
    info!(entries = entries.len(), "fetched full-video subtitles");
    Ok(entries)
}

/// Format selector capped at the quality's height.
fn format_selector(quality: Quality) -> String {
    let h = quality.height_cap();
    format!(
        "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4][height<={h}]/best",
    )
}

/// Heuristics for stderr lines that mean "this source cannot serve ranges".
fn is_section_rejection(stderr: &str) -> bool {
    stderr.contains("--download-sections")
        || stderr.contains("does not support")
        || stderr.contains("Unable to download section")
        || stderr.contains("DASH")
}

/// Run yt-dlp with a deadline and optional cancellation.
async fn run_ytdlp(
    args: &[&str],
    timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<std::process::Output> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    debug!("running: yt-dlp {}", args.join(" "));
    let mut child = Command::new("yt-dlp")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes while waiting; a metadata dump can exceed the pipe
    // buffer and would deadlock a bare wait()
    let stdout_handle = read_pipe(child.stdout.take());
    let stderr_handle = read_pipe(child.stderr.take());

    let wait = async {
        tokio::select! {
            result = child.wait() => result.map(Some),
            _ = wait_cancel(cancel) => Ok(None),
        }
    };

    let status = match tokio::time::timeout(timeout, wait).await {
        Ok(Ok(Some(status))) => status,
        Ok(Ok(None)) => {
            child.kill().await.ok();
            return Err(MediaError::Cancelled);
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            child.kill().await.ok();
            return Err(MediaError::Timeout(timeout.as_secs()));
        }
    };

    let stdout = stdout_handle.await.unwrap_or_default();
    let stderr = stderr_handle.await.unwrap_or_default();

    if !status.success() {
        let text = String::from_utf8_lossy(&stderr);
        let last = text.lines().last().unwrap_or("unknown error");
        return Err(MediaError::download_failed(last.to_string()));
    }

    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

/// Read a child pipe to completion on a background task.
fn read_pipe<R>(pipe: Option<R>) -> tokio::task::JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            use tokio::io::AsyncReadExt;
            pipe.read_to_end(&mut buf).await.ok();
        }
        buf
    })
}

async fn wait_cancel(cancel: Option<watch::Receiver<bool>>) {
    match cancel {
        Some(mut rx) => {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending().await,
    }
}

/// Parse a WebVTT document into subtitle entries.
fn parse_vtt(content: &str) -> Vec<SubtitleEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some((start, end)) = parse_cue_timing(line) else {
            continue;
        };

        let mut text_lines: Vec<String> = Vec::new();
        while let Some(&next) = lines.peek() {
            if next.trim().is_empty() || parse_cue_timing(next).is_some() {
                break;
            }
            let cleaned = strip_vtt_tags(next);
            if !cleaned.is_empty() {
                text_lines.push(cleaned);
            }
            lines.next();
        }

        if !text_lines.is_empty() {
            entries.push(SubtitleEntry::new(start, end, text_lines.join(" ")));
        }
    }

    // Auto-generated tracks repeat rolling lines; drop exact duplicates
    entries.dedup_by(|b, a| a.text == b.text && (a.end_s - b.start_s).abs() < 1.0);
    entries
}

/// Parse a `HH:MM:SS.mmm --> HH:MM:SS.mmm` cue line.
fn parse_cue_timing(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.trim().split_whitespace().next()?;
    Some((parse_vtt_time(start.trim())?, parse_vtt_time(end)?))
}

fn parse_vtt_time(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    let (h, m, sec) = match parts.len() {
        3 => (
            parts[0].parse::<f64>().ok()?,
            parts[1].parse::<f64>().ok()?,
            parts[2].parse::<f64>().ok()?,
        ),
        2 => (0.0, parts[0].parse::<f64>().ok()?, parts[1].parse::<f64>().ok()?),
        _ => return None,
    };
    Some(h * 3600.0 + m * 60.0 + sec)
}

/// Remove inline `<c>`/timing tags from a VTT text line.
fn strip_vtt_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
