//! Time limit parsing utilities for Slurm output.

use std::time::Duration;

/// Parse a Slurm time limit.
///
/// Supports:
/// - D-HH:MM:SS, D-HH:MM, D-HH
/// - HH:MM:SS
/// - MM:SS
/// - Minutes as integer
///
/// Returns None for "infinite", "UNLIMITED", unparseable input, or a limit
/// too large to count in seconds.
pub fn parse_time_limit(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty()
        || s == "-"
        || s.eq_ignore_ascii_case("infinite")
        || s.eq_ignore_ascii_case("unlimited")
    {
        return None;
    }

    let (days, time_part) = match s.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().ok()?, rest),
        None => (0, s),
    };

    let time_parts: Vec<u64> = time_part
        .split(':')
        .map(|p| p.parse().ok())
        .collect::<Option<_>>()?;

    let seconds = match (days > 0 || s.contains('-'), time_parts.as_slice()) {
        (_, &[h, m, sec]) => clock_secs(h, m, sec),
        (true, &[h, m]) => clock_secs(h, m, 0),
        (true, &[h]) => clock_secs(h, 0, 0),
        (false, &[m, sec]) => clock_secs(0, m, sec),
        (false, &[m]) => clock_secs(0, m, 0),
        _ => None,
    }?;

    let total = days.checked_mul(86400)?.checked_add(seconds)?;
    Some(Duration::from_secs(total))
}

/// `None` on overflow.
fn clock_secs(hours: u64, minutes: u64, seconds: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Format a Slurm time limit for display (e.g. "2 days, 12 hours").
pub fn format_time_limit(s: &str) -> String {
    let Some(limit) = parse_time_limit(s) else {
        let trimmed = s.trim();
        return if trimmed.eq_ignore_ascii_case("infinite")
            || trimmed.eq_ignore_ascii_case("unlimited")
        {
            "unlimited".to_string()
        } else {
            trimmed.to_string()
        };
    };

    let secs = limit.as_secs();
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let mins = (secs % 3600) / 60;

    match (days, hours) {
        (0, 0) => plural(mins, "minute"),
        (0, h) => plural(h, "hour"),
        (d, 0) => plural(d, "day"),
        (d, h) => format!("{}, {}", plural(d, "day"), plural(h, "hour")),
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_limit() {
        assert_eq!(parse_time_limit("1:00:00"), Some(Duration::from_secs(3600)));
        assert_eq!(
            parse_time_limit("1-00:00:00"),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(
            parse_time_limit("2-12"),
            Some(Duration::from_secs(2 * 86400 + 12 * 3600))
        );
        assert_eq!(parse_time_limit("30:00"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_time_limit("15"), Some(Duration::from_secs(900)));
        assert!(parse_time_limit("infinite").is_none());
        assert!(parse_time_limit("UNLIMITED").is_none());
        assert!(parse_time_limit("n/a").is_none());
    }

    #[test]
    fn test_parse_time_limit_overflow_is_unparseable() {
        assert!(parse_time_limit("213503982334602-00:00:00").is_none());
        assert!(parse_time_limit("5124095576030432:00:00").is_none());
        assert!(parse_time_limit("18446744073709551615:00").is_none());
        assert!(parse_time_limit("1-5124095576030431:00:00").is_none());
        assert_eq!(format_time_limit("213503982334602-00:00:00"), "213503982334602-00:00:00");
    }

    #[test]
    fn test_format_time_limit() {
        assert_eq!(format_time_limit("2:00:00"), "2 hours");
        assert_eq!(format_time_limit("1:00:00"), "1 hour");
        assert_eq!(format_time_limit("2-02:00:00"), "2 days, 2 hours");
        assert_eq!(format_time_limit("7-00:00:00"), "7 days");
        assert_eq!(format_time_limit("48:00:00"), "2 days");
        assert_eq!(format_time_limit("30:00"), "30 minutes");
        assert_eq!(format_time_limit("infinite"), "unlimited");
        assert_eq!(format_time_limit("bogus"), "bogus");
    }
}
