//! Playback clock helpers.

/// Convert engine seconds to whole milliseconds.
///
/// Truncates toward zero like the engine's own integer position reports.
/// Negative and non-finite values map to 0.
pub fn secs_to_millis(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0) as u64
}

/// Format a millisecond position as `MM:SS`.
///
/// Minutes are not wrapped into hours, so a 90 minute file reads `90:00`.
pub fn format_clock(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero() {
        assert_eq!(format_clock(0), "00:00");
    }

    #[test]
    fn drops_sub_second_part() {
        assert_eq!(format_clock(61_999), "01:01");
    }

    #[test]
    fn minutes_do_not_wrap() {
        assert_eq!(format_clock(90 * 60 * 1000), "90:00");
    }

    #[test]
    fn seconds_to_millis() {
        assert_eq!(secs_to_millis(1.2345), 1234);
        assert_eq!(secs_to_millis(-3.0), 0);
        assert_eq!(secs_to_millis(f64::NAN), 0);
    }
}
