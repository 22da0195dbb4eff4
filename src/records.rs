use crate::clock::WallTime;
use crate::scheduling::{Correction, Schedule};
use chrono::{Days, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One nap, either projected by the scheduler or confirmed by a caregiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NapEvent {
    pub start: WallTime,
    pub end: WallTime,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default = "default_predicted")]
    pub predicted: bool,
}

fn default_predicted() -> bool {
    true
}

impl NapEvent {
    pub fn actual(start: WallTime, end: WallTime) -> Self {
        Self {
            start,
            end,
            duration_minutes: start.minutes_until(end),
            predicted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub morning_wake: Option<WallTime>,
    #[serde(default)]
    pub naps: Vec<NapEvent>,
    pub night_sleep: Option<WallTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_predicted: Option<bool>,
    #[serde(default)]
    pub feeds: Vec<WallTime>,
    #[serde(default)]
    pub predictions: Option<Schedule>,
    #[serde(default)]
    pub calendar_event_ids: BTreeMap<String, String>,
}

impl DailyRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            morning_wake: None,
            naps: Vec::new(),
            night_sleep: None,
            night_predicted: None,
            feeds: Vec::new(),
            predictions: None,
            calendar_event_ids: BTreeMap::new(),
        }
    }

    /// A completed day: wake time, at least one nap and a night-sleep time.
    pub fn is_trainable(&self) -> bool {
        self.morning_wake.is_some() && !self.naps.is_empty() && self.night_sleep.is_some()
    }

    /// Corrections for every nap a caregiver has confirmed, numbered from 1.
    pub fn confirmed_corrections(&self) -> Vec<Correction> {
        self.naps
            .iter()
            .enumerate()
            .filter(|(_, nap)| !nap.predicted)
            .map(|(i, nap)| Correction::finished(i + 1, nap.start, nap.end))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BabyInfo {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
}

impl Default for BabyInfo {
    fn default() -> Self {
        Self {
            name: "Baby".into(),
            birth_date: None,
        }
    }
}

/// The persisted collection of day records, unique per date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepLog {
    #[serde(default)]
    pub baby_info: BabyInfo,
    #[serde(default)]
    pub days: Vec<DailyRecord>,
}

impl SleepLog {
    pub fn day(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn day_mut(&mut self, date: NaiveDate) -> Option<&mut DailyRecord> {
        self.days.iter_mut().find(|d| d.date == date)
    }

    /// Today's record, created empty on first use.
    pub fn today_mut(&mut self, today: NaiveDate) -> &mut DailyRecord {
        let idx = match self.days.iter().position(|d| d.date == today) {
            Some(idx) => idx,
            None => {
                debug!("Creating record for {}", today);
                self.days.push(DailyRecord::empty(today));
                self.days.len() - 1
            }
        };
        &mut self.days[idx]
    }

    pub fn yesterday(&self, today: NaiveDate) -> Option<&DailyRecord> {
        today
            .checked_sub_days(Days::new(1))
            .and_then(|date| self.day(date))
    }

    /// Insert or replace the record for `record.date`, keeping calendar ids already
    /// synced for that date and the collection sorted by date.
    pub fn upsert_day(&mut self, mut record: DailyRecord) -> &DailyRecord {
        if let Some(pos) = self.days.iter().position(|d| d.date == record.date) {
            let existing = self.days.remove(pos);
            if record.calendar_event_ids.is_empty() {
                record.calendar_event_ids = existing.calendar_event_ids;
            }
        }
        let date = record.date;
        self.days.push(record);
        self.days.sort_by_key(|d| d.date);

        let idx = self.days.iter().position(|d| d.date == date).unwrap_or(0);
        &self.days[idx]
    }

    /// Completed days eligible for training.
    pub fn historical_days(&self, today: NaiveDate, exclude_today: bool) -> Vec<&DailyRecord> {
        self.days
            .iter()
            .filter(|d| !(exclude_today && d.date == today))
            .filter(|d| d.is_trainable())
            .collect()
    }
}
