use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use shared::{domain::Configuration, error::HoursError};

const TIME_FORMAT: &str = "%I:%M%p";

/// Store opening window resolved onto a concrete date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl OperatingWindow {
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.start <= now && now <= self.end
    }
}

pub fn is_within_operating_hours(
    now: NaiveDateTime,
    config: &Configuration,
) -> Result<bool, HoursError> {
    Ok(operating_window(now, config)?.contains(now))
}

pub fn operating_window(
    now: NaiveDateTime,
    config: &Configuration,
) -> Result<OperatingWindow, HoursError> {
    let day = now.weekday();
    let range = config.hours_of_operation.range_for(day);
    let (start, end) = parse_range(range).map_err(|reason| malformed(day, range, reason))?;

    let date = now.date();
    Ok(OperatingWindow {
        start: date.and_time(start),
        end: date.and_time(end),
    })
}

/// Splits `"9:00am-5:00pm"` into its two times of day.
pub fn parse_range(range: &str) -> Result<(NaiveTime, NaiveTime), String> {
    let parts: Vec<&str> = range.split('-').map(str::trim).collect();
    let [start, end] = parts.as_slice() else {
        return Err(format!(
            "expected exactly one '-' separating two times, found {} part(s)",
            parts.len()
        ));
    };
    if start.is_empty() || end.is_empty() {
        return Err("start and end times must both be present".into());
    }

    Ok((parse_time(start)?, parse_time(end)?))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    NaiveTime::parse_from_str(&compact, TIME_FORMAT)
        .map_err(|error| format!("'{raw}' is not a 12-hour time like 9:00am ({error})"))
}

fn malformed(day: Weekday, range: &str, reason: String) -> HoursError {
    HoursError::ConfigMalformed {
        day,
        range: range.to_string(),
        reason,
    }
}

#[cfg(test)]
#[path = "tests/hours_tests.rs"]
mod tests;
