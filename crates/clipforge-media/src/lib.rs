//! Media coordination for Clipforge.
//!
//! This crate owns every invocation of the external downloader (yt-dlp)
//! and transcoder (ffmpeg/ffprobe): signal probes, metadata and subtitle
//! fetches, full and partial downloads, reframe analysis, transcoding,
//! caption burns and dub mixes. All spawns are scoped with timeouts and
//! cancellation.

pub mod captions;
pub mod command;
pub mod download;
pub mod error;
pub mod filters;
pub mod probe;
pub mod probes;
pub mod reframe;
pub mod silence;
pub mod transcode;

pub use captions::{burn_captions, mix_dub, render_ass, DubCue, DUB_ORIGINAL_GAIN};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, CaptureOutput, FfmpegCommand, FfmpegRunner};
pub use download::{
    download_section, download_video, fetch_metadata, fetch_subtitles, is_supported_url,
    FetchedMeta,
};
pub use error::{MediaError, MediaResult};
pub use filters::{build_crop_filter, VideoFilter};
pub use probe::{probe_media, verify_audio_track, MediaInfo};
pub use reframe::analyze_reframe;
pub use silence::{detect_silences, SilenceSpan};
pub use transcode::{generate_thumbnail, transcode_clip, TranscodeJob};
