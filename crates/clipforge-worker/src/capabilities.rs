//! External model capabilities: transcription, translation and speech
//! synthesis.
//!
//! Models are external collaborators behind traits. The default
//! implementations shell out to operator-configured commands; handles
//! resolve lazily and are memoized, and a failed resolution poisons the
//! handle so later calls fail fast instead of retrying the load.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use clipforge_models::SubtitleEntry;

use crate::error::{WorkerError, WorkerResult};

/// Per-call deadline for transcription.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-call deadline for translation.
const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-cue deadline for speech synthesis.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Speech-to-text over a clip's audio.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file into clip-relative subtitle entries.
    async fn transcribe(&self, media: &Path) -> WorkerResult<Vec<SubtitleEntry>>;
}

/// Subtitle translation.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        entries: &[SubtitleEntry],
        target_lang: &str,
    ) -> WorkerResult<Vec<SubtitleEntry>>;
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into a WAV file at `output`.
    async fn synthesize(&self, text: &str, lang: &str, output: &Path) -> WorkerResult<()>;
}

/// Wire format shared with the capability commands.
#[derive(Debug, Serialize, Deserialize)]
struct WireEntry {
    start: f64,
    end: f64,
    text: String,
}

impl From<&SubtitleEntry> for WireEntry {
    fn from(e: &SubtitleEntry) -> Self {
        Self {
            start: e.start_s,
            end: e.end_s,
            text: e.text.clone(),
        }
    }
}

impl From<WireEntry> for SubtitleEntry {
    fn from(w: WireEntry) -> Self {
        SubtitleEntry::new(w.start, w.end, w.text)
    }
}

/// Transcriber backed by an operator-configured command.
///
/// Invoked as `<bin> <media-path>`; stdout is a JSON array of
/// `{start, end, text}` entries.
pub struct CommandTranscriber {
    bin: PathBuf,
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, media: &Path) -> WorkerResult<Vec<SubtitleEntry>> {
        let output = run_command(
            Command::new(&self.bin).arg(media),
            None,
            TRANSCRIBE_TIMEOUT,
            "transcriber",
        )
        .await?;

        let entries: Vec<WireEntry> = serde_json::from_slice(&output)?;
        debug!(entries = entries.len(), "transcription complete");
        Ok(entries.into_iter().map(Into::into).collect())
    }
}

/// Translator backed by an operator-configured command.
///
/// Invoked as `<bin> <target-lang>`; entries go in on stdin and come back
/// translated on stdout, both as JSON arrays.
pub struct CommandTranslator {
    bin: PathBuf,
}

#[async_trait]
impl Translator for CommandTranslator {
    async fn translate(
        &self,
        entries: &[SubtitleEntry],
        target_lang: &str,
    ) -> WorkerResult<Vec<SubtitleEntry>> {
        let input: Vec<WireEntry> = entries.iter().map(Into::into).collect();
        let payload = serde_json::to_vec(&input)?;

        let output = run_command(
            Command::new(&self.bin).arg(target_lang),
            Some(payload),
            TRANSLATE_TIMEOUT,
            "translator",
        )
        .await?;

        let translated: Vec<WireEntry> = serde_json::from_slice(&output)?;
        if translated.len() != entries.len() {
            warn!(
                sent = entries.len(),
                received = translated.len(),
                "translator changed entry count"
            );
        }
        Ok(translated.into_iter().map(Into::into).collect())
    }
}

/// Synthesizer backed by an operator-configured command.
///
/// Invoked as `<bin> <lang> <text> <output-wav>`.
pub struct CommandSynthesizer {
    bin: PathBuf,
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, lang: &str, output: &Path) -> WorkerResult<()> {
        run_command(
            Command::new(&self.bin).arg(lang).arg(text).arg(output),
            None,
            SYNTH_TIMEOUT,
            "synthesizer",
        )
        .await?;

        if !output.exists() {
            return Err(WorkerError::enhancement("synthesizer produced no audio"));
        }
        Ok(())
    }
}

/// Run a capability command with a deadline, feeding optional stdin.
async fn run_command(
    command: &mut Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
    label: &str,
) -> WorkerResult<Vec<u8>> {
    let mut child = command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| WorkerError::CapabilityUnavailable(format!("{}: {}", label, e)))?;

    if let Some(payload) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(&payload).await?;
        }
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(WorkerError::enhancement(format!(
                "{} timed out after {}s",
                label,
                timeout.as_secs()
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkerError::enhancement(format!(
            "{} failed: {}",
            label,
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }
    Ok(output.stdout)
}

/// Lazily resolved, memoized capability handle with poisoning.
enum CellState<T> {
    Empty,
    Ready(T),
    Poisoned(String),
}

pub struct CapabilityCell<T: ?Sized> {
    state: Mutex<CellState<Arc<T>>>,
    env_var: &'static str,
    fallback_bin: &'static str,
    label: &'static str,
}

impl<T: ?Sized> CapabilityCell<T> {
    pub fn new(env_var: &'static str, fallback_bin: &'static str, label: &'static str) -> Self {
        Self {
            state: Mutex::new(CellState::Empty),
            env_var,
            fallback_bin,
            label,
        }
    }

    /// Resolve the handle, memoizing the result. A failure poisons the
    /// cell so later callers fail fast.
    pub async fn get_or_init(
        &self,
        build: impl FnOnce(PathBuf) -> Arc<T>,
    ) -> WorkerResult<Arc<T>> {
        let mut state = self.state.lock().await;
        match &*state {
            CellState::Ready(handle) => Ok(handle.clone()),
            CellState::Poisoned(reason) => Err(WorkerError::CapabilityUnavailable(reason.clone())),
            CellState::Empty => match self.resolve_bin() {
                Ok(bin) => {
                    let handle = build(bin);
                    *state = CellState::Ready(handle.clone());
                    Ok(handle)
                }
                Err(reason) => {
                    warn!(capability = self.label, reason = %reason, "capability poisoned");
                    *state = CellState::Poisoned(reason.clone());
                    Err(WorkerError::CapabilityUnavailable(reason))
                }
            },
        }
    }

    fn resolve_bin(&self) -> Result<PathBuf, String> {
        if let Ok(path) = std::env::var(self.env_var) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
            return Err(format!("{}: {} does not exist", self.label, path.display()));
        }
        which::which(self.fallback_bin)
            .map_err(|_| format!("{}: {} not found in PATH", self.label, self.fallback_bin))
    }
}

/// The capability registry carried by a worker.
pub struct Capabilities {
    transcriber: CapabilityCell<dyn Transcriber>,
    translator: CapabilityCell<dyn Translator>,
    synthesizer: CapabilityCell<dyn SpeechSynthesizer>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl Capabilities {
    pub fn new() -> Self {
        Self {
            transcriber: CapabilityCell::new(
                "CLIPFORGE_TRANSCRIBER_BIN",
                "whisper-cli",
                "transcriber",
            ),
            translator: CapabilityCell::new(
                "CLIPFORGE_TRANSLATOR_BIN",
                "argos-translate-cli",
                "translator",
            ),
            synthesizer: CapabilityCell::new("CLIPFORGE_TTS_BIN", "piper", "synthesizer"),
        }
    }

    pub async fn transcriber(&self) -> WorkerResult<Arc<dyn Transcriber>> {
        self.transcriber
            .get_or_init(|bin| Arc::new(CommandTranscriber { bin }))
            .await
    }

    pub async fn translator(&self) -> WorkerResult<Arc<dyn Translator>> {
        self.translator
            .get_or_init(|bin| Arc::new(CommandTranslator { bin }))
            .await
    }

    pub async fn synthesizer(&self) -> WorkerResult<Arc<dyn SpeechSynthesizer>> {
        self.synthesizer
            .get_or_init(|bin| Arc::new(CommandSynthesizer { bin }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_poisons_cell() {
        let cell: CapabilityCell<dyn Transcriber> =
            CapabilityCell::new("CLIPFORGE_TEST_NO_SUCH_VAR", "no-such-binary-xyz", "test");

        let first = cell
            .get_or_init(|bin| Arc::new(CommandTranscriber { bin }) as Arc<dyn Transcriber>)
            .await;
        assert!(matches!(first, Err(WorkerError::CapabilityUnavailable(_))));

        // Second call fails fast from the poisoned state
        let second = cell
            .get_or_init(|bin| Arc::new(CommandTranscriber { bin }) as Arc<dyn Transcriber>)
            .await;
        assert!(matches!(second, Err(WorkerError::CapabilityUnavailable(_))));
    }

    #[test]
    fn test_wire_entry_round_trip() {
        let entry = SubtitleEntry::new(1.0, 2.5, "hola");
        let wire: WireEntry = (&entry).into();
        let json = serde_json::to_string(&wire).unwrap();
        let back: WireEntry = serde_json::from_str(&json).unwrap();
        let restored: SubtitleEntry = back.into();
        assert_eq!(restored, entry);
    }
}
