//! Poll durations
//!
//! The create command offers fixed choices (`1d`, `2d`, `3d`, `1w`, `2w`) but
//! also accepts free text such as `90s`, `1.5h` or `2 days`. A bare number is
//! read as milliseconds. Footers print the remaining time in long form
//! (`2 days`, `36 minutes`).

use crate::{PollError, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const SECOND: f64 = 1000.0;
const MINUTE: f64 = SECOND * 60.0;
const HOUR: f64 = MINUTE * 60.0;
const DAY: f64 = HOUR * 24.0;
const WEEK: f64 = DAY * 7.0;
const YEAR: f64 = DAY * 365.25;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(-?(?:\d+)?\.?\d+) *(milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)?$",
        )
        .expect("duration pattern is valid")
    })
}

/// Parse a poll duration
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let invalid = || PollError::validation(format!("Invalid duration: {}", text));

    let caps = pattern().captures(text).ok_or_else(invalid)?;
    let amount: f64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "ms".to_string());

    let scale = match unit.as_str() {
        "years" | "year" | "yrs" | "yr" | "y" => YEAR,
        "weeks" | "week" | "w" => WEEK,
        "days" | "day" | "d" => DAY,
        "hours" | "hour" | "hrs" | "hr" | "h" => HOUR,
        "minutes" | "minute" | "mins" | "min" | "m" => MINUTE,
        "seconds" | "second" | "secs" | "sec" | "s" => SECOND,
        _ => 1.0,
    };

    let millis = amount * scale;
    if !millis.is_finite() || millis < 1.0 {
        return Err(PollError::validation("Duration must be positive"));
    }

    Duration::try_from_secs_f64(millis / 1000.0)
        .map_err(|_| PollError::validation("Duration is too long"))
}

/// Render a duration in long form, e.g. `1 day`, `3 hours`, `500 ms`
pub fn humanize(duration: Duration) -> String {
    let ms = duration.as_millis() as f64;
    if ms >= DAY {
        return plural(ms, DAY, "day");
    }
    if ms >= HOUR {
        return plural(ms, HOUR, "hour");
    }
    if ms >= MINUTE {
        return plural(ms, MINUTE, "minute");
    }
    if ms >= SECOND {
        return plural(ms, SECOND, "second");
    }
    format!("{} ms", ms)
}

fn plural(ms: f64, unit: f64, name: &str) -> String {
    let amount = (ms / unit).round();
    let suffix = if ms >= unit * 1.5 { "s" } else { "" };
    format!("{} {}{}", amount, name, suffix)
}
