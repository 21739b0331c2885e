//! Time label formatting for the transport display

/// Format seconds as `m:ss`, or `h:m:ss` once past the hour
///
/// Non-finite input renders as an empty string so a label bound to a song
/// without a known duration stays blank.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return String::new();
    }
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
