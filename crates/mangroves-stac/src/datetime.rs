//! Datetime ranges for searches and item properties.

use crate::{Result, StacError};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Closed UTC interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatetimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DatetimeRange {
    /// The whole calendar year.
    pub fn year(year: i32) -> Result<Self> {
        let start = start_of_day(year, 1, 1).ok_or_else(|| invalid(&year.to_string()))?;
        let end = end_of_day(year, 12, 31).ok_or_else(|| invalid(&year.to_string()))?;
        Ok(Self { start, end })
    }

    /// RFC 3339 interval as used by STAC `datetime` search parameters.
    pub fn to_interval(&self) -> String {
        format!("{}/{}", rfc3339(&self.start), rfc3339(&self.end))
    }
}

impl fmt::Display for DatetimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_interval())
    }
}

/// Parses `YYYY`, `YYYY-MM-DD`, an RFC 3339 instant, or a `/`-separated pair
/// of those. A bare year expands to the whole year and a date to the whole
/// day, so `2019/2020` covers both years.
impl FromStr for DatetimeRange {
    type Err = StacError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (start, end) = match s.split_once('/') {
            Some((a, b)) => (parse_bound(a, s)?.0, parse_bound(b, s)?.1),
            None => parse_bound(s, s)?,
        };
        if end < start {
            return Err(invalid(s));
        }
        Ok(Self { start, end })
    }
}

/// Format an instant the way STAC documents use it.
pub fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One side of an interval, as the (earliest, latest) instants it stands for.
fn parse_bound(part: &str, whole: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let part = part.trim();

    if part.len() == 4 && part.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = part.parse().map_err(|_| invalid(whole))?;
        let range = DatetimeRange::year(year)?;
        return Ok((range.start, range.end));
    }

    if let Ok(date) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
        let start = day_bound(date, 0, 0, 0).ok_or_else(|| invalid(whole))?;
        let end = day_bound(date, 23, 59, 59).ok_or_else(|| invalid(whole))?;
        return Ok((start, end));
    }

    DateTime::parse_from_rfc3339(part)
        .map(|dt| {
            let dt = dt.with_timezone(&Utc);
            (dt, dt)
        })
        .map_err(|_| invalid(whole))
}

fn start_of_day(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    day_bound(NaiveDate::from_ymd_opt(year, month, day)?, 0, 0, 0)
}

fn end_of_day(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    day_bound(NaiveDate::from_ymd_opt(year, month, day)?, 23, 59, 59)
}

fn day_bound(date: NaiveDate, hour: u32, min: u32, sec: u32) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(hour, min, sec)?))
}

fn invalid(s: &str) -> StacError {
    StacError::InvalidDatetime(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_expands_to_full_year() {
        let range: DatetimeRange = "2020".parse().expect("Should parse year");
        assert_eq!(range.to_interval(), "2020-01-01T00:00:00Z/2020-12-31T23:59:59Z");
    }

    #[test]
    fn test_year_pair_spans_both_years() {
        let range: DatetimeRange = "2019/2020".parse().expect("Should parse pair");
        assert_eq!(range.to_interval(), "2019-01-01T00:00:00Z/2020-12-31T23:59:59Z");
    }

    #[test]
    fn test_dates_and_instants() {
        let range: DatetimeRange = "2021-03-01/2021-03-31".parse().expect("Should parse dates");
        assert_eq!(range.to_interval(), "2021-03-01T00:00:00Z/2021-03-31T23:59:59Z");

        let range: DatetimeRange = "2021-03-01T10:00:00Z".parse().expect("Should parse instant");
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_invalid_datetimes() {
        assert!("20".parse::<DatetimeRange>().is_err());
        assert!("2021/2020".parse::<DatetimeRange>().is_err());
        assert!("last year".parse::<DatetimeRange>().is_err());
        assert!("2020-13-01".parse::<DatetimeRange>().is_err());
    }
}
