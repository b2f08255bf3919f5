//! Wall-clock normalization across IANA timezones.
//!
//! A client-supplied local date/time plus zone name becomes an
//! unambiguous aware instant; the same instant can be mirrored into a
//! fixed operator reference zone for confirmations.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::SchedulingError;

/// Accepted wall-clock formats: 12-hour with AM/PM, then 24-hour.
const TIME_FORMATS: [&str; 2] = ["%I:%M %p", "%H:%M"];

pub fn parse_zone(name: &str) -> Result<Tz, SchedulingError> {
    name.parse::<Tz>()
        .map_err(|_| SchedulingError::Timezone(name.to_string()))
}

/// Resolve `date` (`YYYY-MM-DD`) and `time` (`hh:mm AM/PM`) as wall-clock
/// time in `zone`. Local times that do not exist or occur twice around a
/// DST transition are rejected instead of silently shifted.
pub fn normalize(date: &str, time: &str, zone: &Tz) -> Result<DateTime<Tz>, SchedulingError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| SchedulingError::TimeParse(format!("bad date: {date:?}")))?;
    let time = parse_time(time)?;
    let naive = date.and_time(time);

    match zone.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt),
        chrono::LocalResult::Ambiguous(..) => Err(SchedulingError::TimeParse(format!(
            "{naive} occurs twice in {zone} (DST fall-back); pick another time"
        ))),
        chrono::LocalResult::None => Err(SchedulingError::TimeParse(format!(
            "{naive} does not exist in {zone} (DST spring-forward)"
        ))),
    }
}

fn parse_time(time: &str) -> Result<NaiveTime, SchedulingError> {
    let time = time.trim();
    for fmt in TIME_FORMATS {
        if let Ok(parsed) = NaiveTime::parse_from_str(time, fmt) {
            return Ok(parsed);
        }
    }
    Err(SchedulingError::TimeParse(format!("bad time: {time:?}")))
}

/// Human rendering in the instant's own zone, e.g. `22 Oct 2025, 03:30 PM EDT`.
pub fn display<T: TimeZone>(instant: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    instant.format("%d %b %Y, %I:%M %p %Z").to_string()
}

/// The same instant mirrored into the operator reference zone.
pub fn reference_display<T: TimeZone>(instant: &DateTime<T>, reference: &Tz) -> String {
    display(&instant.with_timezone(reference))
}

/// Fallback slot when a caller supplies no explicit time: two days from
/// `now`, fixed mid-day (12:00) in the reference zone. A policy choice,
/// not an inference.
pub fn default_slot(now: DateTime<Utc>, reference: &Tz) -> DateTime<Tz> {
    let local = now.with_timezone(reference) + Duration::days(2);
    let noon = local
        .date_naive()
        .and_hms_opt(12, 0, 0)
        .unwrap_or_else(|| local.naive_local());
    reference
        .from_local_datetime(&noon)
        .earliest()
        .unwrap_or_else(|| now.with_timezone(reference) + Duration::days(2))
}

/// Scan a free-text chat message for `YYYY-MM-DD` and `hh:mm AM/PM`
/// tokens. Returns `(date, time)` when both are present.
pub fn extract_wall_clock(text: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();

    let date = tokens
        .iter()
        .find(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d").is_ok())?
        .to_string();

    for (i, token) in tokens.iter().enumerate() {
        if !token.contains(':') {
            continue;
        }
        // "03:30 PM" as two tokens
        if let Some(next) = tokens.get(i + 1) {
            let candidate = format!("{token} {}", next.to_uppercase());
            if NaiveTime::parse_from_str(&candidate, "%I:%M %p").is_ok() {
                return Some((date, candidate));
            }
        }
        // "15:30" or "3:30pm" as one token
        let upper = token.to_uppercase();
        let spaced = upper.replace("AM", " AM").replace("PM", " PM");
        if NaiveTime::parse_from_str(&spaced, "%I:%M %p").is_ok()
            || NaiveTime::parse_from_str(&upper, "%H:%M").is_ok()
        {
            let normalized = if spaced.contains(' ') { spaced } else { upper };
            return Some((date, normalized));
        }
    }
    None
}
