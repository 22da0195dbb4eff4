//! Day-to-day workflow around the scheduler: start a day from its wake time and fold
//! caregiver corrections into today's record.

use crate::clock::{WallTime, MINUTES_PER_DAY};
use crate::error::{Result, SleepError};
use crate::model::Model;
use crate::records::SleepLog;
use crate::scheduling::{self, Correction, CorrectionSet, Schedule};
use chrono::NaiveDate;
use log::{debug, info};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionTarget {
    Nap(usize),
    Night,
}

impl FromStr for CorrectionTarget {
    type Err = SleepError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("night") {
            return Ok(CorrectionTarget::Night);
        }
        s.parse::<usize>()
            .map(CorrectionTarget::Nap)
            .map_err(|_| SleepError::InvalidTarget(s.to_string()))
    }
}

/// Record today's wake time and store a fresh prediction for the day.
pub fn start_day(log: &mut SleepLog, today: NaiveDate, wake: WallTime, model: &Model) -> Schedule {
    let schedule = scheduling::predict(wake, model);
    let day = log.today_mut(today);
    day.morning_wake = Some(wake);
    day.predictions = Some(schedule.clone());
    info!("Started {} at {}", today, wake);
    schedule
}

/// Yesterday's bedtime and the minutes from it through midnight to `wake`.
pub fn last_night(log: &SleepLog, today: NaiveDate, wake: WallTime) -> Option<(WallTime, i64)> {
    let night = log.yesterday(today)?.night_sleep?;
    Some((night, MINUTES_PER_DAY - night.minutes_of_day() + wake.minutes_of_day()))
}

/// Apply an actual nap time to today's record and re-project the rest of the day.
pub fn correct_nap(
    log: &mut SleepLog,
    today: NaiveDate,
    model: &Model,
    nap_number: usize,
    start: WallTime,
    end: Option<WallTime>,
) -> Result<Schedule> {
    let day = log.today_mut(today);
    let wake = day.morning_wake.ok_or(SleepError::NoWakeTimeToday)?;

    if nap_number < 1 || nap_number > model.typical_naps_count {
        return Err(SleepError::NapOutOfRange {
            number: nap_number,
            max: model.typical_naps_count,
        });
    }

    let mut corrections: CorrectionSet = day.confirmed_corrections().into_iter().collect();
    corrections.insert(Correction {
        nap_number,
        start,
        end,
    });

    let mut schedule = scheduling::recalculate(wake, &corrections, model);

    // a night time confirmed earlier survives nap corrections
    if let Some(previous) = day.predictions.as_ref().filter(|p| !p.night_predicted) {
        schedule.confirm_night(previous.night_sleep);
    }

    // actual naps past the model's slots stay in the record
    let extra: Vec<_> = day
        .naps
        .iter()
        .skip(schedule.naps.len())
        .filter(|nap| !nap.predicted)
        .cloned()
        .collect();
    if !extra.is_empty() {
        debug!("Keeping {} confirmed nap(s) beyond slot {}", extra.len(), schedule.naps.len());
    }
    day.naps = schedule.naps.iter().cloned().chain(extra).collect();
    day.predictions = Some(schedule.clone());
    info!("Nap {} corrected for {}", nap_number, today);
    Ok(schedule)
}

/// Record the actual night-sleep start. Returns the updated schedule when one exists.
pub fn correct_night(
    log: &mut SleepLog,
    today: NaiveDate,
    start: WallTime,
) -> Result<Option<Schedule>> {
    let day = log.today_mut(today);
    if day.morning_wake.is_none() {
        return Err(SleepError::NoWakeTimeToday);
    }

    day.night_sleep = Some(start);
    day.night_predicted = Some(false);
    if let Some(schedule) = day.predictions.as_mut() {
        schedule.confirm_night(start);
    }
    info!("Night sleep for {} set to {}", today, start);
    Ok(day.predictions.clone())
}
