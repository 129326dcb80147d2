//! Spoken date/time parsing and formatting

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, NaiveTime, TimeZone,
    Weekday,
};
use regex::Regex;

use crate::schedule::parse_duration;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").unwrap());
static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\s+(\d{1,2})\b",
    )
    .unwrap()
});

/// Hour used when a phrase names a day but no time
const DEFAULT_HOUR: u32 = 9;

/// Parse a spoken point in time relative to `now`
///
/// Handles relative offsets ("in 20 minutes"), day words ("tomorrow at
/// 3pm", "friday at noon"), month-day phrases ("september 1 at 5pm"), and
/// literal timestamps ("2026-09-01 15:00"). A bare time with no date rolls
/// to tomorrow when it has already passed today.
#[must_use]
pub fn parse_when(text: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    // Relative: "in 20 minutes", "in an hour and a half" is out of scope
    if let Some(rest) = text.strip_prefix("in ") {
        if let Some(offset) = parse_duration(rest) {
            return Some(now + ChronoDuration::from_std(offset).ok()?);
        }
    }

    // Literal timestamps pass through untouched
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Local));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M") {
        return Local.from_local_datetime(&naive).earliest();
    }

    let explicit_date = parse_date_word(&text, now);
    let time = parse_time_of_day(&text);

    match (explicit_date, time) {
        (Some(date), time) => {
            let time = time.unwrap_or_else(|| {
                NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or_default()
            });
            let candidate = Local.from_local_datetime(&date.and_time(time)).earliest()?;
            // Weekday phrases always mean a future occurrence
            if candidate <= now && is_weekday_phrase(&text) {
                return Some(candidate + ChronoDuration::days(7));
            }
            Some(candidate)
        }
        (None, Some(time)) => {
            let candidate = Local
                .from_local_datetime(&now.date_naive().and_time(time))
                .earliest()?;
            if candidate <= now {
                Some(candidate + ChronoDuration::days(1))
            } else {
                Some(candidate)
            }
        }
        (None, None) => None,
    }
}

fn parse_date_word(text: &str, now: DateTime<Local>) -> Option<NaiveDate> {
    if text.contains("tomorrow") {
        return Some(now.date_naive() + ChronoDuration::days(1));
    }
    if text.contains("today") || text.contains("tonight") {
        return Some(now.date_naive());
    }

    if let Some(weekday) = parse_weekday(text) {
        let today = now.weekday().num_days_from_monday();
        let target = weekday.num_days_from_monday();
        let ahead = i64::from((target + 7 - today) % 7);
        return Some(now.date_naive() + ChronoDuration::days(ahead));
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let mut date = NaiveDate::from_ymd_opt(now.year(), month, day)?;
        if date < now.date_naive() {
            date = NaiveDate::from_ymd_opt(now.year() + 1, month, day)?;
        }
        return Some(date);
    }

    None
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    if text.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if text.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    for caps in TIME_RE.captures_iter(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let meridiem = caps.get(3).map(|m| m.as_str());

        // A bare number with no minutes or meridiem is too ambiguous to be
        // a time ("september 1" must not read the day as an hour)
        if caps.get(2).is_none() && meridiem.is_none() {
            continue;
        }

        let hour = match meridiem {
            Some("pm") if hour < 12 => hour + 12,
            Some("am") if hour == 12 => 0,
            _ => hour,
        };
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return Some(time);
        }
    }
    None
}

fn parse_weekday(text: &str) -> Option<Weekday> {
    const DAYS: [(&str, Weekday); 7] = [
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ];
    DAYS.iter()
        .find(|(name, _)| text.contains(name))
        .map(|&(_, day)| day)
}

fn is_weekday_phrase(text: &str) -> bool {
    parse_weekday(text).is_some()
}

fn month_number(name: &str) -> Option<u32> {
    let month = match &name[..3.min(name.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Render a point in time for speech, e.g. "Tuesday, September 01 at 03:00 PM"
#[must_use]
pub fn format_when(when: DateTime<Local>) -> String {
    when.format("%A, %B %d at %I:%M %p").to_string()
}

/// Render the current wall-clock time, e.g. "03:07 PM"
#[must_use]
pub fn format_clock(now: DateTime<Local>) -> String {
    now.format("%I:%M %p").to_string()
}
