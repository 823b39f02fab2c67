//! Time display helpers.

/// `MM:SS.mmm`. Negative or non-finite input renders as `00:00.000`.
///
/// Minutes are not wrapped into hours, so an 85-minute position reads `85:00.000`.
pub fn seconds_to_mmss(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return String::from("00:00.000");
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = seconds % 60.0;
    format!("{:02}:{:06.3}", minutes, secs)
}

/// `HH:MM:SS` when the duration reaches an hour, `MM:SS` otherwise.
pub fn seconds_to_hms(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return String::from("00:00:00");
    }
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
