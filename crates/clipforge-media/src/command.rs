//! Transcoder command builder and runner.
//!
//! Every spawn is a scoped resource: the child is killed on timeout and on
//! cancellation, and stderr is captured for diagnostics on every exit path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Keep at most this many trailing stderr lines for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// Builder for ffmpeg invocations.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Seek position before the first input
    seek: Option<f64>,
    /// Duration limit before the first input
    duration: Option<f64>,
    inputs: Vec<PathBuf>,
    /// Arguments after the inputs
    output_args: Vec<String>,
    /// `None` renders to the null muxer (analysis passes)
    output: Option<PathBuf>,
    log_level: String,
}

impl FfmpegCommand {
    /// Command transcoding `input` into `output`.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            seek: None,
            duration: None,
            inputs: vec![input.as_ref().to_path_buf()],
            output_args: Vec::new(),
            output: Some(output.as_ref().to_path_buf()),
            log_level: "error".to_string(),
        }
    }

    /// Analysis pass over `input` with no output file; filter logs go to
    /// stderr and are parsed by the caller.
    pub fn analysis(input: impl AsRef<Path>) -> Self {
        Self {
            seek: None,
            duration: None,
            inputs: vec![input.as_ref().to_path_buf()],
            output_args: Vec::new(),
            output: None,
            log_level: "info".to_string(),
        }
    }

    /// Add a secondary input.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(input.as_ref().to_path_buf());
        self
    }

    /// Seek into the first input.
    pub fn seek(mut self, seconds: f64) -> Self {
        self.seek = Some(seconds);
        self
    }

    /// Limit the read duration of the first input.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the full argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), self.log_level.clone()];

        if let Some(seek) = self.seek {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", seek));
        }
        if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(format!("{:.3}", duration));
        }

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());

        match &self.output {
            Some(path) => args.push(path.to_string_lossy().to_string()),
            None => {
                args.push("-f".to_string());
                args.push("null".to_string());
                args.push("-".to_string());
            }
        }

        args
    }
}

/// What an analysis pass produced.
#[derive(Debug)]
pub struct CaptureOutput {
    /// Full captured stderr
    pub stderr: String,
    /// The pass was killed at its deadline; stderr holds partial results
    pub timed_out: bool,
}

/// Runner with timeout and cancellation for ffmpeg commands.
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout: None,
        }
    }

    /// Observe a cancellation flag while the child runs.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a transcode command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let (status, stderr, timed_out) = self.spawn_and_wait(cmd).await?;

        if timed_out {
            return Err(MediaError::Timeout(
                self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            ));
        }
        match status {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(MediaError::ffmpeg_failed(
                "ffmpeg exited with non-zero status",
                Some(tail(&stderr)),
                status.code(),
            )),
            None => Err(MediaError::Cancelled),
        }
    }

    /// Run an analysis pass and return its stderr for parsing.
    ///
    /// A timeout is not an error here: the partial stderr collected so far
    /// is returned with `timed_out` set, so length-classed probes can keep
    /// whatever events they saw.
    pub async fn run_capture(&self, cmd: &FfmpegCommand) -> MediaResult<CaptureOutput> {
        let (status, stderr, timed_out) = self.spawn_and_wait(cmd).await?;

        if timed_out {
            warn!("analysis pass timed out, keeping partial output");
            return Ok(CaptureOutput { stderr, timed_out: true });
        }
        match status {
            Some(status) if status.success() => Ok(CaptureOutput { stderr, timed_out: false }),
            Some(status) => Err(MediaError::ffmpeg_failed(
                "ffmpeg analysis pass failed",
                Some(tail(&stderr)),
                status.code(),
            )),
            None => Err(MediaError::Cancelled),
        }
    }

    /// Spawn the child and wait for exit, timeout or cancellation.
    ///
    /// Returns `(exit_status, stderr, timed_out)`; a `None` status means the
    /// run was cancelled.
    async fn spawn_and_wait(
        &self,
        cmd: &FfmpegCommand,
    ) -> MediaResult<(Option<std::process::ExitStatus>, String, bool)> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("running: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr_handle = drain_stderr(&mut child);

        if self.is_cancelled() {
            child.kill().await.ok();
            let stderr = stderr_handle.await.unwrap_or_default();
            return Ok((None, stderr, false));
        }

        // The sleep branch is disabled without a timeout; the bound only
        // keeps the future constructible
        let deadline = self.timeout.unwrap_or(Duration::from_secs(86_400));

        tokio::select! {
            status = child.wait() => {
                let stderr = stderr_handle.await.unwrap_or_default();
                Ok((Some(status?), stderr, false))
            }
            _ = tokio::time::sleep(deadline), if self.timeout.is_some() => {
                warn!(timeout_secs = deadline.as_secs(), "ffmpeg deadline reached, killing process");
                child.kill().await.ok();
                let stderr = stderr_handle.await.unwrap_or_default();
                Ok((None, stderr, true))
            }
            _ = wait_cancel(self.cancel_rx.clone()) => {
                debug!("ffmpeg cancelled, killing process");
                child.kill().await.ok();
                let stderr = stderr_handle.await.unwrap_or_default();
                Ok((None, stderr, false))
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }
}

/// Resolve only when the cancel flag flips to true.
async fn wait_cancel(cancel_rx: Option<watch::Receiver<bool>>) {
    match cancel_rx {
        Some(mut rx) => {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    // Sender dropped without cancelling: never resolve
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending().await,
    }
}

/// Accumulate the child's stderr into a string.
fn drain_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    })
}

/// Last lines of a stderr dump, for error messages.
fn tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Check that ffmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check that ffprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Check that yt-dlp is available.
pub fn check_ytdlp() -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}
