//! Human-readable time formatting
//!
//! The sleep timer display is derived from the remaining seconds and never
//! stored; these helpers produce that text.

/// Countdown format threshold: one hour
const HOUR_SECONDS: u64 = 3600;

/// Format a countdown as `M:SS` below one hour and `H:MM:SS` above.
///
/// # Examples
///
/// ```
/// use lull_common::human_time::format_countdown;
///
/// assert_eq!(format_countdown(0), "0:00");
/// assert_eq!(format_countdown(65), "1:05");
/// assert_eq!(format_countdown(3600), "1:00:00");
/// assert_eq!(format_countdown(5430), "1:30:30");
/// ```
pub fn format_countdown(seconds: u64) -> String {
    if seconds < HOUR_SECONDS {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        let hours = seconds / HOUR_SECONDS;
        let mins = (seconds % HOUR_SECONDS) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Format a timer length for menus: `45 min`, `1 h`, `1 h 30 min`.
///
/// # Examples
///
/// ```
/// use lull_common::human_time::format_timer_label;
///
/// assert_eq!(format_timer_label(45 * 60), "45 min");
/// assert_eq!(format_timer_label(3600), "1 h");
/// assert_eq!(format_timer_label(5400), "1 h 30 min");
/// ```
pub fn format_timer_label(seconds: u64) -> String {
    let hours = seconds / HOUR_SECONDS;
    let mins = (seconds % HOUR_SECONDS) / 60;
    match (hours, mins) {
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} h", h),
        (h, m) => format!("{} h {} min", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_countdown() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(9), "0:09");
        assert_eq!(format_countdown(299), "4:59");
        assert_eq!(format_countdown(3599), "59:59");
    }

    #[test]
    fn test_long_countdown() {
        assert_eq!(format_countdown(3600), "1:00:00");
        assert_eq!(format_countdown(3661), "1:01:01");
        assert_eq!(format_countdown(7200), "2:00:00");
    }

    #[test]
    fn test_timer_label() {
        assert_eq!(format_timer_label(15 * 60), "15 min");
        assert_eq!(format_timer_label(2 * 3600), "2 h");
        assert_eq!(format_timer_label(3600 + 15 * 60), "1 h 15 min");
    }
}
