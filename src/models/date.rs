//! Calendar-day key used to merge diary entries.
//!
//! Two saves on the same day carry different instants, so entries are keyed
//! by the calendar day alone. The canonical display form is `DD/MM/YYYY`
//! (the `key` field of persisted entries); on the wire the date is ISO 8601.

use std::{fmt, str::FromStr};

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const KEY_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiaryDate(NaiveDate);

impl DiaryDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, ValidationError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidDate(format!("{year:04}-{month:02}-{day:02}")))
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Day of a reading's wall-clock timestamp.
    pub fn of(timestamp: NaiveDateTime) -> Self {
        Self(timestamp.date())
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// `DD/MM/YYYY`, independent of the device locale.
    pub fn key(&self) -> String {
        self.0.format(KEY_FORMAT).to_string()
    }
}

impl fmt::Display for DiaryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

impl FromStr for DiaryDate {
    type Err = ValidationError;

    /// Accepts the canonical `DD/MM/YYYY` key as well as ISO `YYYY-MM-DD`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        NaiveDate::parse_from_str(trimmed, KEY_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate(value.to_string()))
    }
}

impl From<NaiveDate> for DiaryDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_day_month_year() {
        let date = DiaryDate::from_ymd(2024, 1, 5).unwrap();
        assert_eq!(date.key(), "05/01/2024");
        assert_eq!(date.to_string(), "05/01/2024");
    }

    #[test]
    fn parses_both_key_and_iso_forms() {
        let from_key: DiaryDate = "05/01/2024".parse().unwrap();
        let from_iso: DiaryDate = "2024-01-05".parse().unwrap();
        assert_eq!(from_key, from_iso);
        assert!("2024/13/40".parse::<DiaryDate>().is_err());
    }

    #[test]
    fn instants_on_the_same_day_share_a_key() {
        let morning = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let night = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert_eq!(DiaryDate::of(morning), DiaryDate::of(night));
    }

    #[test]
    fn serializes_as_iso_date() {
        let date = DiaryDate::from_ymd(2024, 1, 5).unwrap();
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2024-01-05\"");
    }
}
