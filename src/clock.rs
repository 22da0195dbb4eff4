use crate::error::SleepError;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

const TIME_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A wall-clock time of day at minute precision, meaningful only within one local date.
///
/// Persisted and displayed as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallTime(NaiveTime);

impl WallTime {
    /// Build a time from minutes past midnight, wrapping into the 24h day.
    pub fn from_day_minutes(minutes: i64) -> Self {
        let wrapped = minutes.rem_euclid(MINUTES_PER_DAY) as u32;
        // rem_euclid keeps hour < 24 and minute < 60
        WallTime(NaiveTime::from_hms_opt(wrapped / 60, wrapped % 60, 0).unwrap_or_default())
    }

    pub fn minutes_of_day(&self) -> i64 {
        (self.0.hour() * 60 + self.0.minute()) as i64
    }

    /// Signed minutes from `self` to `later` on the same day. Negative when `later` is
    /// earlier on the clock; there is no midnight wrap.
    pub fn minutes_until(&self, later: WallTime) -> i64 {
        later.minutes_of_day() - self.minutes_of_day()
    }

    pub fn add_minutes(&self, minutes: i64) -> Self {
        Self::from_day_minutes(self.minutes_of_day() + minutes)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for WallTime {
    type Err = SleepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
            .map(WallTime)
            .map_err(|_| SleepError::InvalidTime(s.to_string()))
    }
}

impl TryFrom<String> for WallTime {
    type Error = SleepError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallTime> for String {
    fn from(value: WallTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, SleepError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| SleepError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> WallTime {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_formats_zero_padded() {
        assert_eq!(t("07:05").to_string(), "07:05");
        assert_eq!(t("7:05").to_string(), "07:05");
        assert_eq!(t("23:59").minutes_of_day(), 23 * 60 + 59);
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["", "24:00", "12:60", "noon", "12-30", "12:30:15"] {
            assert_eq!(
                bad.parse::<WallTime>(),
                Err(SleepError::InvalidTime(bad.to_string())),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn minutes_until_is_signed_without_wrap() {
        assert_eq!(t("07:00").minutes_until(t("09:30")), 150);
        assert_eq!(t("12:30").minutes_until(t("11:00")), -90);
    }

    #[test]
    fn add_minutes_wraps_past_midnight() {
        assert_eq!(t("20:00").add_minutes(660), t("07:00"));
        assert_eq!(t("00:10").add_minutes(-20), t("23:50"));
        assert_eq!(WallTime::from_day_minutes(MINUTES_PER_DAY + 61), t("01:01"));
    }

    #[test]
    fn serializes_as_hh_mm_string() {
        let json = serde_json::to_string(&t("09:30")).unwrap();
        assert_eq!(json, "\"09:30\"");
        let back: WallTime = serde_json::from_str("\"19:45\"").unwrap();
        assert_eq!(back, t("19:45"));
        assert!(serde_json::from_str::<WallTime>("\"25:00\"").is_err());
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2025-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("15/01/2025"),
            Err(SleepError::InvalidDate("15/01/2025".into()))
        );
    }
}
