use baby_sleep::training::{mean_minutes, median_count};
use baby_sleep::{train, DailyRecord, Model, NapEvent, WallTime};
use chrono::NaiveDate;
use proptest::prelude::*;

fn t(s: &str) -> WallTime {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn record(d: &str, wake: &str, nap: (&str, &str), night: &str) -> DailyRecord {
    DailyRecord {
        morning_wake: Some(t(wake)),
        naps: vec![NapEvent::actual(t(nap.0), t(nap.1))],
        night_sleep: Some(t(night)),
        ..DailyRecord::empty(date(d))
    }
}

#[test]
fn empty_history_gives_default_model() {
    let model = train(Vec::<&DailyRecord>::new(), date("2025-06-01"));
    assert_eq!(model.wake_windows, vec![150, 165, 180]);
    assert_eq!(model.nap_durations, vec![75, 90, 45]);
    assert_eq!(model.typical_naps_count, 3);
    assert_eq!(model.night_sleep_window, 120);
    assert_eq!(model.night_sleep_duration, 660);
    assert_eq!(model.days_count, 0);
    assert_eq!(model.trained_on, Some(date("2025-06-01")));
}

#[test]
fn slot_wake_window_averages_days() {
    let days = [
        record("2025-01-01", "07:00", ("09:30", "10:30"), "19:00"),
        record("2025-01-02", "07:00", ("09:40", "10:40"), "19:00"),
    ];
    assert_eq!(train(&days, date("2025-01-03")).wake_windows, vec![155]);
}

#[test]
fn night_duration_needs_adjacent_days() {
    let adjacent = [
        record("2025-01-01", "06:00", ("09:00", "10:00"), "21:00"),
        record("2025-01-02", "07:00", ("09:00", "10:00"), "20:00"),
    ];
    // (24h - 21:00) + 07:00
    assert_eq!(train(&adjacent, date("2025-01-05")).night_sleep_duration, 600);

    let gap = [
        record("2025-01-01", "06:00", ("09:00", "10:00"), "21:30"),
        record("2025-01-03", "07:00", ("09:00", "10:00"), "21:30"),
    ];
    let model = train(&gap, date("2025-01-05"));
    assert_eq!(model.night_sleep_duration, Model::default().night_sleep_duration);
}

proptest! {
    #[test]
    fn mean_truncates_toward_zero(samples in prop::collection::vec(-600i64..900, 1..40)) {
        let mean = mean_minutes(&samples).unwrap();
        let exact = samples.iter().sum::<i64>() as f64 / samples.len() as f64;
        prop_assert_eq!(mean, exact.trunc() as i64);
        prop_assert!(mean >= *samples.iter().min().unwrap());
        prop_assert!(mean <= *samples.iter().max().unwrap());
    }

    #[test]
    fn median_is_a_truncated_middle_value(counts in prop::collection::vec(1usize..8, 1..30)) {
        let median = median_count(&counts).unwrap();
        let mut sorted = counts.clone();
        sorted.sort();
        let n = sorted.len();
        let expected = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            ((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0).trunc() as usize
        };
        prop_assert_eq!(median, expected);
    }

    #[test]
    fn trained_model_is_consistent(
        days in prop::collection::vec(
            (300i64..480, prop::collection::vec((60i64..180, 20i64..100), 1..5), 60i64..180),
            1..12,
        )
    ) {
        let start = date("2025-03-01");
        let records: Vec<DailyRecord> = days
            .iter()
            .enumerate()
            .map(|(i, (wake, naps, night_window))| {
                let mut cursor = *wake;
                let naps = naps
                    .iter()
                    .map(|(window, length)| {
                        let nap_start = cursor + window;
                        cursor = nap_start + length;
                        NapEvent::actual(
                            WallTime::from_day_minutes(nap_start),
                            WallTime::from_day_minutes(cursor),
                        )
                    })
                    .collect();
                DailyRecord {
                    morning_wake: Some(WallTime::from_day_minutes(*wake)),
                    naps,
                    night_sleep: Some(WallTime::from_day_minutes(cursor + night_window)),
                    ..DailyRecord::empty(start + chrono::Days::new(i as u64))
                }
            })
            .collect();

        let model = train(&records, date("2025-04-01"));
        prop_assert!(model.is_consistent());
        prop_assert_eq!(model.days_count, records.len());
        prop_assert!(model.typical_naps_count >= 1);
        prop_assert_eq!(train(records.iter().rev(), date("2025-04-01")), model);
    }
}
