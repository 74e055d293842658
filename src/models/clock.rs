//! In-match clock values.
//!
//! The analysis service reports elapsed match time as `H:MM:SS(.fff)`
//! strings. Everything downstream works in whole seconds.

/// Parse an `H:MM:SS(.fff)` clock into whole seconds.
///
/// Returns `None` for fewer than three colon-separated parts or any part
/// that is not a number.
pub fn parse_clock(raw: &str) -> Option<u32> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() < 3 {
        return None;
    }

    let hours: f64 = parts[0].trim().parse().ok()?;
    let minutes: f64 = parts[1].trim().parse().ok()?;
    let seconds: f64 = parts[2].trim().parse().ok()?;

    let total = (hours.trunc() * 3600.0 + minutes.trunc() * 60.0 + seconds).floor();
    if !total.is_finite() || total < 0.0 || total > u32::MAX as f64 {
        return None;
    }
    Some(total as u32)
}

/// Format seconds as `M:SS`, or `H:MM:SS` past the hour. Fractions are dropped.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// [`format_clock`] for an optional value; absent renders as `N/A`.
pub fn format_clock_opt(seconds: Option<f64>) -> String {
    seconds.map(format_clock).unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_with_fraction() {
        assert_eq!(parse_clock("0:09:26.720"), Some(566));
    }

    #[test]
    fn test_parse_clock_hours() {
        assert_eq!(parse_clock("1:02:03"), Some(3723));
        assert_eq!(parse_clock("0:00:59.999"), Some(59));
    }

    #[test]
    fn test_parse_clock_too_few_parts() {
        assert_eq!(parse_clock("09:26"), None);
        assert_eq!(parse_clock("566"), None);
        assert_eq!(parse_clock(""), None);
    }

    #[test]
    fn test_parse_clock_garbage() {
        assert_eq!(parse_clock("a:b:c"), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(566.0), "9:26");
        assert_eq!(format_clock(3723.0), "1:02:03");
        assert_eq!(format_clock(59.9), "0:59");
        assert_eq!(format_clock(0.0), "0:00");
    }

    #[test]
    fn test_format_clock_opt() {
        assert_eq!(format_clock_opt(None), "N/A");
        assert_eq!(format_clock_opt(Some(125.0)), "2:05");
    }

    #[test]
    fn test_format_clock_large_values_stay_seconds() {
        // 200000 seconds is rendered as-is, never reinterpreted as milliseconds.
        assert_eq!(format_clock(200_000.0), "55:33:20");
    }
}
