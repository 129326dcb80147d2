//! Natural-language duration parsing and formatting

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:hours?|hrs?|h)\b").unwrap());
static MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:minutes?|mins?|m)\b").unwrap());
static SECONDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:seconds?|secs?|s)\b").unwrap());
static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").unwrap());

/// Parse a spoken duration like "5 minutes", "1.5 hours", or "90s"
///
/// Units may be combined ("1 hour 20 minutes"). A bare number is taken as
/// minutes. Returns `None` when nothing parses or the total is not positive.
#[must_use]
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.to_lowercase();

    if let Some(caps) = BARE_NUMBER_RE.captures(&text) {
        let minutes: f64 = caps[1].parse().ok()?;
        return positive_secs(minutes * 60.0);
    }

    let mut total = 0.0;
    let mut matched = false;

    if let Some(caps) = HOURS_RE.captures(&text) {
        total += caps[1].parse::<f64>().ok()? * 3600.0;
        matched = true;
    }
    if let Some(caps) = MINUTES_RE.captures(&text) {
        total += caps[1].parse::<f64>().ok()? * 60.0;
        matched = true;
    }
    if let Some(caps) = SECONDS_RE.captures(&text) {
        total += caps[1].parse::<f64>().ok()?;
        matched = true;
    }

    if matched {
        positive_secs(total)
    } else {
        None
    }
}

fn positive_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Render a duration for speech, e.g. "1 hour 20 minutes"
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();

    if total < 60 {
        return plural(total, "second");
    }

    if total < 3600 {
        let minutes = total / 60;
        let seconds = total % 60;
        let mut out = plural(minutes, "minute");
        if seconds > 0 {
            out.push(' ');
            out.push_str(&plural(seconds, "second"));
        }
        return out;
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let mut out = plural(hours, "hour");
    if minutes > 0 {
        out.push(' ');
        out.push_str(&plural(minutes, "minute"));
    }
    out
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("5 minutes"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2 hours"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("90 seconds"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("3 min"), Some(Duration::from_secs(180)));
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(
            parse_duration("1.5 hours"),
            Some(Duration::from_secs(5400))
        );
    }

    #[test]
    fn test_parse_combined_units() {
        assert_eq!(
            parse_duration("1 hour 20 minutes"),
            Some(Duration::from_secs(4800))
        );
        assert_eq!(
            parse_duration("2 minutes 30 seconds"),
            Some(Duration::from_secs(150))
        );
    }

    #[test]
    fn test_bare_number_is_minutes() {
        assert_eq!(parse_duration("5"), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_parse_embedded_in_phrase() {
        assert_eq!(
            parse_duration("set a timer for 10 minutes please"),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_parse_rejects_garbage_and_zero() {
        assert_eq!(parse_duration("a while"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("0 minutes"), None);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_duration(Duration::from_secs(1)), "1 second");
        assert_eq!(format_duration(Duration::from_secs(45)), "45 seconds");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1 minute");
        assert_eq!(
            format_duration(Duration::from_secs(150)),
            "2 minutes 30 seconds"
        );
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1 hour");
        assert_eq!(
            format_duration(Duration::from_secs(4800)),
            "1 hour 20 minutes"
        );
    }
}
