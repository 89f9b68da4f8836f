//! Timestamp parsing and formatting helpers.

/// Parse a timestamp literal (`"h:mm:ss"`, `"m:ss"`, or `"N"`) into whole
/// seconds. Returns `None` for anything that is not a plain timestamp.
pub fn parse_timestamp(ts: &str) -> Option<u32> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }

    let parts: Vec<&str> = ts.split(':').collect();
    match parts.len() {
        1 => parts[0].parse::<u32>().ok(),
        2 => {
            let minutes: u32 = parts[0].parse().ok()?;
            let seconds: u32 = parts[1].parse().ok()?;
            if parts[1].len() != 2 || seconds >= 60 {
                return None;
            }
            Some(minutes * 60 + seconds)
        }
        3 => {
            let hours: u32 = parts[0].parse().ok()?;
            let minutes: u32 = parts[1].parse().ok()?;
            let seconds: u32 = parts[2].parse().ok()?;
            if parts[1].len() != 2 || parts[2].len() != 2 || minutes >= 60 || seconds >= 60 {
                return None;
            }
            Some(hours * 3600 + minutes * 60 + seconds)
        }
        _ => None,
    }
}

/// Format seconds as an `HH:MM:SS.mmm` timestamp for the transcoder.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0).floor() as u32;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u32;
    let secs = seconds % 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, minutes, secs)
}

/// Format seconds as a short `m:ss` clock string for progress messages.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format seconds as the ASS `H:MM:SS.cc` dialogue time.
pub fn format_ass_time(seconds: f64) -> String {
    let total_centis = (seconds.max(0.0) * 100.0).round() as u64;
    let centis = total_centis % 100;
    let total_secs = total_centis / 100;
    format!(
        "{}:{:02}:{:02}.{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        centis
    )
}
