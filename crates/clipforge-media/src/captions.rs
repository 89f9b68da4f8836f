//! Caption overlay rendering and dubbing audio mixes.
//!
//! Captions are rendered as an ASS stylesheet per clip and burned in with
//! a re-transcode that leaves the muxed audio untouched. Dubbing delays
//! each synthesized cue to its start time and mixes it over the original
//! audio at reduced gain.

use std::path::{Path, PathBuf};

use tracing::info;

use clipforge_models::timestamp::format_ass_time;
use clipforge_models::{CaptionAnimation, CaptionPosition, CaptionStyle, SubtitleEntry};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Gain applied to the original audio under a dub.
pub const DUB_ORIGINAL_GAIN: f64 = 0.15;

/// Render an ASS stylesheet for the clip's subtitle entries.
pub fn render_ass(entries: &[SubtitleEntry], style: &CaptionStyle, play_w: u32, play_h: u32) -> String {
    let mut out = String::new();

    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    out.push_str(&format!("PlayResX: {}\nPlayResY: {}\n", play_w, play_h));
    out.push_str("WrapStyle: 0\nScaledBorderAndShadow: yes\n\n");

    out.push_str("[V4+ Styles]\n");
    out.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BackColour, \
         Bold, Italic, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV\n",
    );
    out.push_str(&format!(
        "Style: Default,{},{},{},{},{},{},0,1,{},{},{},60,60,{}\n\n",
        style.font_name,
        style.font_size,
        style.primary_color,
        style.outline_color,
        style.background_color,
        if style.bold { -1 } else { 0 },
        style.outline,
        style.shadow,
        alignment(style.position),
        margin_v(style.position, play_h),
    ));

    out.push_str("[Events]\n");
    out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");

    for entry in entries {
        match style.animation {
            CaptionAnimation::WordByWord => render_word_by_word(&mut out, entry),
            CaptionAnimation::Pop => {
                out.push_str(&dialogue(
                    entry.start_s,
                    entry.end_s,
                    &format!(
                        "{{\\fscx70\\fscy70\\t(0,120,\\fscx100\\fscy100)}}{}",
                        escape_ass(&entry.text)
                    ),
                ));
            }
            CaptionAnimation::None => {
                out.push_str(&dialogue(entry.start_s, entry.end_s, &escape_ass(&entry.text)));
            }
        }
    }

    out
}

/// One dialogue line per word with the active word highlighted.
fn render_word_by_word(out: &mut String, entry: &SubtitleEntry) {
    let words: Vec<&str> = entry.text.split_whitespace().collect();
    if words.is_empty() {
        return;
    }
    let per_word = entry.duration_s() / words.len() as f64;

    for (i, _) in words.iter().enumerate() {
        let start = entry.start_s + i as f64 * per_word;
        let end = entry.start_s + (i + 1) as f64 * per_word;

        let mut text = String::new();
        for (j, word) in words.iter().enumerate() {
            if j > 0 {
                text.push(' ');
            }
            if j == i {
                text.push_str(&format!("{{\\b1\\alpha&H00&}}{}{{\\r}}", escape_ass(word)));
            } else {
                text.push_str(&format!("{{\\alpha&H80&}}{}{{\\r}}", escape_ass(word)));
            }
        }
        out.push_str(&dialogue(start, end, &text));
    }
}

fn dialogue(start_s: f64, end_s: f64, text: &str) -> String {
    format!(
        "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
        format_ass_time(start_s),
        format_ass_time(end_s),
        text
    )
}

/// Numpad alignment code for the caption block position.
fn alignment(position: CaptionPosition) -> u8 {
    match position {
        CaptionPosition::Bottom => 2,
        CaptionPosition::Center => 5,
        CaptionPosition::Top => 8,
    }
}

fn margin_v(position: CaptionPosition, play_h: u32) -> u32 {
    match position {
        CaptionPosition::Bottom => play_h / 8,
        CaptionPosition::Center => 0,
        CaptionPosition::Top => play_h / 10,
    }
}

/// Escape characters that ASS treats specially.
fn escape_ass(text: &str) -> String {
    text.replace('\\', "\\\\").replace('{', "(").replace('}', ")")
}

/// Burn a rendered ASS file into the clip, preserving the muxed audio.
pub async fn burn_captions(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    ass_path: impl AsRef<Path>,
    crf: u8,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let ass = ass_path.as_ref().to_string_lossy().replace('\'', "\\'");

    info!(
        input = %input.as_ref().display(),
        output = %output.as_ref().display(),
        "burning caption overlay"
    );

    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .video_filter(format!("ass='{}'", ass))
        .video_codec("libx264")
        .output_args(["-profile:v", "high", "-pix_fmt", "yuv420p"])
        .preset("medium")
        .crf(crf)
        .audio_codec("copy");

    runner.run(&cmd).await
}

/// A synthesized dub cue on disk.
#[derive(Debug, Clone)]
pub struct DubCue {
    pub audio: PathBuf,
    /// Clip-relative start, seconds
    pub start_s: f64,
}

/// Mix synthesized speech over the clip's original audio.
///
/// Each cue is delayed to its start time; the original track is kept under
/// the dub at [`DUB_ORIGINAL_GAIN`].
pub async fn mix_dub(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    cues: &[DubCue],
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let mut cmd = FfmpegCommand::new(input.as_ref(), output.as_ref());
    for cue in cues {
        cmd = cmd.add_input(&cue.audio);
    }

    let filter = build_dub_filter(cues);
    let cmd = cmd
        .filter_complex(filter)
        .output_args(["-map", "0:v", "-map", "[mixed]"])
        .video_codec("copy")
        .audio_codec("aac")
        .output_args(["-b:a", "192k"]);

    info!(cues = cues.len(), "mixing dubbed audio");
    runner.run(&cmd).await
}

/// Build the adelay/amix graph for a dub.
fn build_dub_filter(cues: &[DubCue]) -> String {
    let mut filter = format!("[0:a]volume={}[orig]", DUB_ORIGINAL_GAIN);
    let mut labels = vec!["[orig]".to_string()];

    for (i, cue) in cues.iter().enumerate() {
        let delay_ms = (cue.start_s.max(0.0) * 1000.0).round() as u64;
        let label = format!("[dub{}]", i);
        filter.push_str(&format!(
            ";[{}:a]adelay={}|{}{}",
            i + 1,
            delay_ms,
            delay_ms,
            label
        ));
        labels.push(label);
    }

    filter.push_str(&format!(
        ";{}amix=inputs={}:duration=first:normalize=0[mixed]",
        labels.join(""),
        labels.len()
    ));
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::CaptionPreset;

    fn entries() -> Vec<SubtitleEntry> {
        vec![
            SubtitleEntry::new(0.5, 2.5, "Hello there"),
            SubtitleEntry::new(3.0, 5.0, "Second cue"),
        ]
    }

    #[test]
    fn test_ass_header_and_style() {
        let style = CaptionPreset::Classic.style().unwrap();
        let ass = render_ass(&entries(), &style, 1080, 1920);

        assert!(ass.contains("PlayResX: 1080"));
        assert!(ass.contains("Style: Default,Arial,52"));
        assert!(ass.contains("Dialogue: 0,0:00:00.50,0:00:02.50,Default"));
        assert_eq!(ass.matches("Dialogue:").count(), 2);
    }

    #[test]
    fn test_word_by_word_emits_one_line_per_word() {
        let style = CaptionPreset::Tiktok.style().unwrap();
        let ass = render_ass(&entries(), &style, 1080, 1920);

        // "Hello there" (2) + "Second cue" (2) = 4 dialogue lines
        assert_eq!(ass.matches("Dialogue:").count(), 4);
        assert!(ass.contains("\\b1"));
    }

    #[test]
    fn test_pop_animation_has_transform() {
        let style = CaptionPreset::BoldPop.style().unwrap();
        let ass = render_ass(&entries(), &style, 1080, 1920);
        assert!(ass.contains("\\t(0,120"));
    }

    #[test]
    fn test_alignment_codes() {
        assert_eq!(alignment(CaptionPosition::Bottom), 2);
        assert_eq!(alignment(CaptionPosition::Center), 5);
        assert_eq!(alignment(CaptionPosition::Top), 8);
    }

    #[test]
    fn test_escape_ass_braces() {
        assert_eq!(escape_ass("a {b} c"), "a (b) c");
        assert_eq!(escape_ass("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_dub_filter_delays_each_cue() {
        let cues = [
            DubCue { audio: PathBuf::from("a.wav"), start_s: 0.5 },
            DubCue { audio: PathBuf::from("b.wav"), start_s: 3.0 },
        ];
        let filter = build_dub_filter(&cues);

        assert!(filter.starts_with("[0:a]volume=0.15[orig]"));
        assert!(filter.contains("[1:a]adelay=500|500[dub0]"));
        assert!(filter.contains("[2:a]adelay=3000|3000[dub1]"));
        assert!(filter.contains("amix=inputs=3:duration=first:normalize=0[mixed]"));
    }
}
