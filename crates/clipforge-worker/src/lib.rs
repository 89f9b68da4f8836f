//! Clipforge job orchestration.
//!
//! Coordinates the downloader, transcoder and model capabilities into two
//! flows: the analysis pipeline (probes → fusion → detection → scoring)
//! and the cut-job pipeline (per-clip fetch → reframe → transcode →
//! captions), with staged progress through the hub and cooperative
//! cancellation.

pub mod analysis;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod runner;

pub use analysis::{analyze_url, AnalysisReport, AnalyzeSettings};
pub use capabilities::{Capabilities, SpeechSynthesizer, Transcriber, Translator};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use pipeline::JobCaches;
pub use runner::{derive_video_id, BatchJobSpec, CutJobSpec, TranslateMode, Worker, MAX_BATCH_URLS};
