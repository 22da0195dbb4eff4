use crate::clock::MINUTES_PER_DAY;
use crate::model::{Model, DEFAULT_NIGHT_DURATION, DEFAULT_NIGHT_WINDOW};
use crate::records::DailyRecord;
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Mean of minute samples, truncated toward zero. `None` for no samples.
///
/// Computed in integer arithmetic so the result never depends on float rounding.
pub fn mean_minutes(samples: &[i64]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<i64>() / samples.len() as i64)
}

/// Median of per-day nap counts; an even-sized list averages the two middle values
/// and truncates toward zero.
pub fn median_count(counts: &[usize]) -> Option<usize> {
    if counts.is_empty() {
        return None;
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2)
    } else {
        Some(sorted[mid])
    }
}

fn fallback_wake_window(slot: usize) -> i64 {
    150 + 15 * slot as i64
}

fn fallback_nap_duration(slot: usize) -> i64 {
    match slot {
        0 => 75,
        1 => 90,
        _ => 60,
    }
}

/// Per-slot and per-day sample lists gathered from trainable days.
#[derive(Debug, Default)]
struct Samples {
    wake_windows: Vec<Vec<i64>>,
    nap_durations: Vec<Vec<i64>>,
    nap_counts: Vec<usize>,
    night_windows: Vec<i64>,
    night_durations: Vec<i64>,
}

impl Samples {
    fn slot_mut(lists: &mut Vec<Vec<i64>>, slot: usize) -> &mut Vec<i64> {
        if lists.len() <= slot {
            lists.resize_with(slot + 1, Vec::new);
        }
        &mut lists[slot]
    }

    fn add_day(&mut self, day: &DailyRecord) {
        let (Some(wake), Some(last)) = (day.morning_wake, day.naps.last()) else {
            return;
        };

        self.nap_counts.push(day.naps.len());

        let mut prev_end = wake;
        for (slot, nap) in day.naps.iter().enumerate() {
            Self::slot_mut(&mut self.wake_windows, slot)
                .push(prev_end.minutes_until(nap.start));
            Self::slot_mut(&mut self.nap_durations, slot)
                .push(nap.start.minutes_until(nap.end));
            prev_end = nap.end;
        }

        if let Some(night) = day.night_sleep {
            self.night_windows.push(last.end.minutes_until(night));
        }
    }

    /// Pair each night with the next calendar day's morning wake.
    fn add_night_durations(&mut self, days: &BTreeMap<NaiveDate, &DailyRecord>) {
        for (date, day) in days {
            let Some(night) = day.night_sleep else {
                continue;
            };
            let next_wake = date
                .checked_add_days(Days::new(1))
                .and_then(|next| days.get(&next))
                .and_then(|next_day| next_day.morning_wake);
            if let Some(wake) = next_wake {
                let duration =
                    (MINUTES_PER_DAY - night.minutes_of_day()) + wake.minutes_of_day();
                debug!("Night of {}: {}min", date, duration);
                self.night_durations.push(duration);
            }
        }
    }

    fn slot_mean(lists: &[Vec<i64>], slot: usize) -> Option<i64> {
        lists.get(slot).and_then(|samples| mean_minutes(samples))
    }
}

/// Derive a fresh model from historical day records.
///
/// Days that are not trainable are skipped. With no trainable days the baseline model
/// is returned, stamped with `trained_on`.
pub fn train<'a, I>(records: I, trained_on: NaiveDate) -> Model
where
    I: IntoIterator<Item = &'a DailyRecord>,
{
    let mut days: Vec<&DailyRecord> = records
        .into_iter()
        .filter(|d| d.is_trainable())
        .collect();

    if days.is_empty() {
        warn!("No trainable days, falling back to default patterns");
        return Model {
            trained_on: Some(trained_on),
            ..Model::default()
        };
    }

    days.sort_by_key(|d| d.date);

    let mut samples = Samples::default();
    for day in &days {
        samples.add_day(day);
    }
    // a duplicated date keeps its last record, like the per-date lookup
    let by_date: BTreeMap<NaiveDate, &DailyRecord> = days.iter().map(|d| (d.date, *d)).collect();
    samples.add_night_durations(&by_date);

    // never empty here: every trainable day has at least one nap
    let typical_naps_count =
        median_count(&samples.nap_counts).unwrap_or(Model::default().typical_naps_count);

    let wake_windows: Vec<i64> = (0..typical_naps_count)
        .map(|slot| {
            Samples::slot_mean(&samples.wake_windows, slot)
                .unwrap_or_else(|| fallback_wake_window(slot))
        })
        .collect();
    let nap_durations: Vec<i64> = (0..typical_naps_count)
        .map(|slot| {
            Samples::slot_mean(&samples.nap_durations, slot)
                .unwrap_or_else(|| fallback_nap_duration(slot))
        })
        .collect();

    let model = Model {
        wake_windows,
        nap_durations,
        typical_naps_count,
        night_sleep_window: mean_minutes(&samples.night_windows)
            .unwrap_or(DEFAULT_NIGHT_WINDOW),
        night_sleep_duration: mean_minutes(&samples.night_durations)
            .unwrap_or(DEFAULT_NIGHT_DURATION),
        trained_on: Some(trained_on),
        days_count: days.len(),
    };

    info!(
        "Trained on {} days: {} naps, wake windows {:?}, durations {:?}, night window {}min, night duration {}min ({} samples)",
        model.days_count,
        model.typical_naps_count,
        model.wake_windows,
        model.nap_durations,
        model.night_sleep_window,
        model.night_sleep_duration,
        samples.night_durations.len()
    );

    model
}
