//! Schedule expressions.

use crate::errors::ConfigError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

const HOUR: i64 = 3_600;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
/// 1970-01-01 was a Thursday; weeks start on the Monday four days later.
const WEEK_OFFSET: i64 = 4 * DAY;

static EVERY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^every\s+(\d+)\s*([smh])$").ok());

/// When the scheduler fires.
///
/// Parsed from `@once`, `@hourly`, `@daily`, `@weekly` or `every <n><s|m|h>`.
/// Calendar schedules fire on UTC boundaries (weeks start on Monday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Schedule {
    /// A single run, right away.
    Once,
    /// At the top of every hour.
    Hourly,
    /// At midnight.
    Daily,
    /// At midnight between Sunday and Monday.
    Weekly,
    /// At a fixed interval from the previous fire time.
    Every(Duration),
}

impl Schedule {
    /// The first fire time strictly after `after`, or `None` for `@once`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Once => None,
            Self::Hourly => next_boundary(after, HOUR, 0),
            Self::Daily => next_boundary(after, DAY, 0),
            Self::Weekly => next_boundary(after, WEEK, WEEK_OFFSET),
            Self::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|d| after.checked_add_signed(d)),
        }
    }

    /// Returns true for schedules that keep firing.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::Once)
    }
}

fn next_boundary(after: DateTime<Utc>, period: i64, offset: i64) -> Option<DateTime<Utc>> {
    let shifted = after.timestamp() - offset;
    let next = (shifted.div_euclid(period) + 1) * period + offset;
    DateTime::from_timestamp(next, 0)
}

impl FromStr for Schedule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expr = s.trim().to_ascii_lowercase();
        match expr.as_str() {
            "@once" => return Ok(Self::Once),
            "@hourly" => return Ok(Self::Hourly),
            "@daily" => return Ok(Self::Daily),
            "@weekly" => return Ok(Self::Weekly),
            _ => {}
        }

        let invalid = || ConfigError::InvalidSchedule(s.to_string());
        let captures = EVERY.as_ref().and_then(|re| re.captures(&expr)).ok_or_else(invalid)?;
        let count: u64 = captures[1].parse().map_err(|_| invalid())?;
        let unit = match &captures[2] {
            "s" => 1,
            "m" => 60,
            _ => 3_600,
        };
        match count.checked_mul(unit) {
            Some(secs) if secs > 0 => Ok(Self::Every(Duration::from_secs(secs))),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Schedule {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.to_string()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => write!(f, "@once"),
            Self::Hourly => write!(f, "@hourly"),
            Self::Daily => write!(f, "@daily"),
            Self::Weekly => write!(f, "@weekly"),
            Self::Every(interval) => {
                let secs = interval.as_secs();
                if secs % 3_600 == 0 {
                    write!(f, "every {}h", secs / 3_600)
                } else if secs % 60 == 0 {
                    write!(f, "every {}m", secs / 60)
                } else {
                    write!(f, "every {secs}s")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!("@once".parse::<Schedule>().unwrap(), Schedule::Once);
        assert_eq!(" @Daily ".parse::<Schedule>().unwrap(), Schedule::Daily);
        assert_eq!("@weekly".parse::<Schedule>().unwrap(), Schedule::Weekly);
    }

    #[test]
    fn test_parse_intervals() {
        assert_eq!(
            "every 30s".parse::<Schedule>().unwrap(),
            Schedule::Every(Duration::from_secs(30))
        );
        assert_eq!(
            "every 15 m".parse::<Schedule>().unwrap(),
            Schedule::Every(Duration::from_secs(900))
        );
        assert_eq!(
            "every 2h".parse::<Schedule>().unwrap(),
            Schedule::Every(Duration::from_secs(7_200))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for expr in ["", "@monthly", "every 0s", "every 5d", "every -1m", "daily"] {
            let err = expr.parse::<Schedule>().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidSchedule(_)), "accepted {expr:?}");
        }
    }

    #[test]
    fn test_display_roundtrip() {
        for expr in ["@once", "@hourly", "@daily", "@weekly", "every 45s", "every 10m", "every 3h"] {
            assert_eq!(expr.parse::<Schedule>().unwrap().to_string(), expr);
        }
    }

    #[test]
    fn test_next_hourly_and_daily() {
        let now = at(2024, 3, 9, 13, 47, 5);
        assert_eq!(Schedule::Hourly.next_after(now), Some(at(2024, 3, 9, 14, 0, 0)));
        assert_eq!(Schedule::Daily.next_after(now), Some(at(2024, 3, 10, 0, 0, 0)));
    }

    #[test]
    fn test_next_is_strictly_after_boundary() {
        let midnight = at(2024, 3, 10, 0, 0, 0);
        assert_eq!(Schedule::Daily.next_after(midnight), Some(at(2024, 3, 11, 0, 0, 0)));
    }

    #[test]
    fn test_next_weekly_is_monday() {
        // 2024-03-09 is a Saturday.
        let now = at(2024, 3, 9, 13, 47, 5);
        assert_eq!(Schedule::Weekly.next_after(now), Some(at(2024, 3, 11, 0, 0, 0)));
    }

    #[test]
    fn test_next_interval_and_once() {
        let now = at(2024, 3, 9, 13, 47, 5);
        let every = Schedule::Every(Duration::from_secs(90));
        assert_eq!(every.next_after(now), Some(at(2024, 3, 9, 13, 48, 35)));
        assert_eq!(Schedule::Once.next_after(now), None);
        assert!(!Schedule::Once.is_recurring());
    }

    #[test]
    fn test_serde_as_string() {
        let schedule: Schedule = serde_json::from_str("\"every 5m\"").unwrap();
        assert_eq!(schedule, Schedule::Every(Duration::from_secs(300)));
        assert_eq!(serde_json::to_string(&Schedule::Hourly).unwrap(), "\"@hourly\"");
    }
}
