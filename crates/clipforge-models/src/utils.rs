//! Filename helpers shared across crates.

/// Maximum length of the sanitized title prefix in output filenames.
const MAX_TITLE_LEN: usize = 50;

/// Sanitize a video title for use in filenames.
///
/// Keeps alphanumerics, replaces runs of anything else with a single
/// underscore, and truncates to 50 characters.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_sep = true;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
        if out.len() >= MAX_TITLE_LEN {
            break;
        }
    }

    let trimmed = out.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "clip".to_string()
    } else {
        trimmed
    }
}

/// Build the output filename for one clip:
/// `{sanitizedTitle}_clip{i+1}_{m}m{ss}s.mp4` with `i` 0-based.
pub fn output_filename(title: &str, clip_index: usize, start_s: f64) -> String {
    let start = start_s.max(0.0).round() as u64;
    format!(
        "{}_clip{}_{}m{:02}s.mp4",
        sanitize_title(title),
        clip_index + 1,
        start / 60,
        start % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Hello, World!"), "Hello_World");
        assert_eq!(sanitize_title("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_title("***"), "clip");
        assert_eq!(sanitize_title("  spaced   out  "), "spaced_out");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(200);
        assert!(sanitize_title(&long).len() <= 50);
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            output_filename("My Video", 0, 95.0),
            "My_Video_clip1_1m35s.mp4"
        );
        assert_eq!(
            output_filename("My Video", 2, 605.4),
            "My_Video_clip3_10m05s.mp4"
        );
    }
}
