//! ISO week periods

use chrono::{DateTime, Datelike, Duration, IsoWeek, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A Monday-to-Sunday ISO week
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekPeriod {
    /// Monday of the week
    start: NaiveDate,
}

impl WeekPeriod {
    /// The week containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        Self {
            start: date - Duration::days(offset),
        }
    }

    /// The week before the current one
    pub fn last_completed(today: NaiveDate) -> Self {
        Self::containing(today).previous()
    }

    pub fn from_iso(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|start| Self { start })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Sunday, inclusive
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(6)
    }

    pub fn previous(&self) -> Self {
        Self {
            start: self.start - Duration::days(7),
        }
    }

    pub fn next(&self) -> Self {
        Self {
            start: self.start + Duration::days(7),
        }
    }

    fn iso_week(&self) -> IsoWeek {
        self.start.iso_week()
    }

    /// `YYYY-Www`; sorts chronologically as text
    pub fn id(&self) -> String {
        let week = self.iso_week();
        format!("{:04}-W{:02}", week.year(), week.week())
    }

    /// Half-open UTC range `[monday 00:00, next monday 00:00)`
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN));
        (start, start + Duration::days(7))
    }
}

impl fmt::Display for WeekPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for WeekPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidRequest(format!("invalid ISO week '{}'", s));
        let (year, week) = s.trim().split_once("-W").ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        Self::from_iso(year, week).ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_starts_monday() {
        let week = WeekPeriod::containing(date(2024, 2, 15));
        assert_eq!(week.start(), date(2024, 2, 12));
        assert_eq!(week.end(), date(2024, 2, 18));
        assert_eq!(week.id(), "2024-W07");
    }

    #[test]
    fn test_year_boundary_uses_iso_year() {
        let week = WeekPeriod::containing(date(2021, 1, 1));
        assert_eq!(week.id(), "2020-W53");
    }

    #[test]
    fn test_parse_and_previous() {
        let week: WeekPeriod = "2024-W07".parse().unwrap();
        assert_eq!(week.start(), date(2024, 2, 12));
        assert_eq!(week.previous().id(), "2024-W06");
        assert!("2024-07".parse::<WeekPeriod>().is_err());
        assert!("2024-W60".parse::<WeekPeriod>().is_err());
    }

    #[test]
    fn test_bounds_cover_seven_days() {
        let week = WeekPeriod::containing(date(2024, 2, 15));
        let (from, to) = week.bounds();
        assert_eq!((to - from).num_days(), 7);
        assert_eq!(from.date_naive(), date(2024, 2, 12));
        assert_eq!(WeekPeriod::last_completed(date(2024, 2, 15)).id(), "2024-W06");
    }
}
