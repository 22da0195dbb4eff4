use crate::clock::WallTime;
use crate::model::Model;
use crate::records::NapEvent;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wake window used for a slot the model has no statistic for.
pub const FALLBACK_WAKE_WINDOW: i64 = 180;
/// Nap duration used for a slot the model has no statistic for.
pub const FALLBACK_NAP_DURATION: i64 = 60;

/// A caregiver-supplied actual nap time. `nap_number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub nap_number: usize,
    pub start: WallTime,
    pub end: Option<WallTime>,
}

impl Correction {
    pub fn started(nap_number: usize, start: WallTime) -> Self {
        Self {
            nap_number,
            start,
            end: None,
        }
    }

    pub fn finished(nap_number: usize, start: WallTime, end: WallTime) -> Self {
        Self {
            nap_number,
            start,
            end: Some(end),
        }
    }
}

/// Corrections keyed by 0-based slot; the last correction supplied for a slot wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionSet {
    by_slot: BTreeMap<usize, Correction>,
}

impl CorrectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, correction: Correction) {
        // nap 0 has no slot; it can never be reached by the sequencing loop
        let Some(slot) = correction.nap_number.checked_sub(1) else {
            debug!("Ignoring correction with nap number 0");
            return;
        };
        self.by_slot.insert(slot, correction);
    }

    pub fn for_slot(&self, slot: usize) -> Option<&Correction> {
        self.by_slot.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

impl FromIterator<Correction> for CorrectionSet {
    fn from_iter<I: IntoIterator<Item = Correction>>(iter: I) -> Self {
        let mut set = CorrectionSet::new();
        for correction in iter {
            set.insert(correction);
        }
        set
    }
}

/// A full day of sequential sleep events projected from one morning wake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub wake_time: WallTime,
    pub naps: Vec<NapEvent>,
    pub night_sleep: WallTime,
    #[serde(default = "night_predicted_default")]
    pub night_predicted: bool,
}

fn night_predicted_default() -> bool {
    true
}

impl Schedule {
    /// Replace the projected night-sleep start with a confirmed one.
    pub fn confirm_night(&mut self, night_sleep: WallTime) {
        self.night_sleep = night_sleep;
        self.night_predicted = false;
    }
}

fn slot_wake_window(model: &Model, slot: usize) -> i64 {
    model
        .wake_windows
        .get(slot)
        .copied()
        .unwrap_or(FALLBACK_WAKE_WINDOW)
}

fn slot_nap_duration(model: &Model, slot: usize) -> i64 {
    model
        .nap_durations
        .get(slot)
        .copied()
        .unwrap_or(FALLBACK_NAP_DURATION)
}

/// Walk the day slot by slot from `wake_time`, sourcing each nap from its correction
/// when one exists and from the model otherwise.
///
/// The cursor counts minutes from the wake day's midnight so that sequencing stays
/// monotonic even when a long day runs past 24:00; only rendered times wrap.
fn sequence_day(wake_time: WallTime, corrections: &CorrectionSet, model: &Model) -> Schedule {
    let mut cursor = wake_time.minutes_of_day();
    let mut naps = Vec::with_capacity(model.typical_naps_count);

    for slot in 0..model.typical_naps_count {
        let nap = match corrections.for_slot(slot) {
            Some(Correction {
                start,
                end: Some(end),
                ..
            }) => {
                trace!("Slot {}: confirmed {}-{}", slot, start, end);
                cursor = end.minutes_of_day();
                NapEvent {
                    start: *start,
                    end: *end,
                    duration_minutes: start.minutes_until(*end),
                    predicted: false,
                }
            }
            Some(Correction {
                start, end: None, ..
            }) => {
                let duration = slot_nap_duration(model, slot);
                trace!("Slot {}: in progress since {}, {}min projected", slot, start, duration);
                cursor = start.minutes_of_day() + duration;
                NapEvent {
                    start: *start,
                    end: WallTime::from_day_minutes(cursor),
                    duration_minutes: duration,
                    predicted: true,
                }
            }
            None => {
                let start = cursor + slot_wake_window(model, slot);
                let duration = slot_nap_duration(model, slot);
                cursor = start + duration;
                trace!("Slot {}: projected at minute {} for {}min", slot, start, duration);
                NapEvent {
                    start: WallTime::from_day_minutes(start),
                    end: WallTime::from_day_minutes(cursor),
                    duration_minutes: duration,
                    predicted: true,
                }
            }
        };
        naps.push(nap);
    }

    Schedule {
        wake_time,
        naps,
        night_sleep: WallTime::from_day_minutes(cursor + model.night_sleep_window),
        night_predicted: true,
    }
}

/// Project a full day's schedule from the morning wake time.
pub fn predict(wake_time: WallTime, model: &Model) -> Schedule {
    debug!(
        "Predicting {} naps from wake time {}",
        model.typical_naps_count, wake_time
    );
    sequence_day(wake_time, &CorrectionSet::new(), model)
}

/// Re-project the day with caregiver corrections layered over the model.
///
/// Corrections for slots beyond `typical_naps_count` are never consulted. Night-sleep
/// overrides are the caller's to apply via [`Schedule::confirm_night`].
pub fn recalculate(wake_time: WallTime, corrections: &CorrectionSet, model: &Model) -> Schedule {
    debug!(
        "Recalculating from wake time {} with {} correction(s)",
        wake_time,
        corrections.len()
    );
    sequence_day(wake_time, corrections, model)
}

/// Expected morning wake time after a night sleep starting at `night_sleep`.
pub fn predict_wake_time(night_sleep: WallTime, model: &Model) -> WallTime {
    night_sleep.add_minutes(model.night_sleep_duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> WallTime {
        s.parse().unwrap()
    }

    fn span(nap: &NapEvent) -> (String, String, i64, bool) {
        (
            nap.start.to_string(),
            nap.end.to_string(),
            nap.duration_minutes,
            nap.predicted,
        )
    }

    #[test]
    fn predict_with_default_model() {
        let schedule = predict(t("07:00"), &Model::default());
        let naps: Vec<_> = schedule.naps.iter().map(span).collect();
        assert_eq!(
            naps,
            vec![
                ("09:30".into(), "10:45".into(), 75, true),
                ("13:30".into(), "15:00".into(), 90, true),
                ("18:00".into(), "18:45".into(), 45, true),
            ]
        );
        assert_eq!(schedule.night_sleep, t("20:45"));
        assert!(schedule.night_predicted);
    }

    #[test]
    fn predict_falls_back_for_slots_missing_from_model() {
        let model = Model {
            wake_windows: vec![120],
            nap_durations: vec![],
            typical_naps_count: 2,
            night_sleep_window: 90,
            ..Model::default()
        };
        let schedule = predict(t("06:00"), &model);
        let naps: Vec<_> = schedule.naps.iter().map(span).collect();
        assert_eq!(
            naps,
            vec![
                ("08:00".into(), "09:00".into(), 60, true),
                ("12:00".into(), "13:00".into(), 60, true),
            ]
        );
        assert_eq!(schedule.night_sleep, t("14:30"));
    }

    #[test]
    fn in_progress_nap_without_learned_duration_uses_fallback() {
        let model = Model {
            wake_windows: vec![120],
            nap_durations: vec![],
            typical_naps_count: 2,
            night_sleep_window: 90,
            ..Model::default()
        };
        let corrections: CorrectionSet = [Correction::started(2, t("11:00"))].into_iter().collect();
        let schedule = recalculate(t("06:00"), &corrections, &model);

        assert_eq!(span(&schedule.naps[1]), ("11:00".into(), "12:00".into(), 60, true));
        assert_eq!(FALLBACK_NAP_DURATION, 60);
        assert_eq!(schedule.night_sleep, t("13:30"));
    }

    #[test]
    fn recalculate_confirmed_nap_shifts_later_slots() {
        let model = Model::default();
        let corrections: CorrectionSet =
            [Correction::finished(2, t("11:00"), t("12:30"))].into_iter().collect();
        let schedule = recalculate(t("07:00"), &corrections, &model);

        let naps: Vec<_> = schedule.naps.iter().map(span).collect();
        assert_eq!(
            naps,
            vec![
                ("09:30".into(), "10:45".into(), 75, true),
                ("11:00".into(), "12:30".into(), 90, false),
                // 12:30 + 180 window, not the pre-correction 15:00 + 180
                ("15:30".into(), "16:15".into(), 45, true),
            ]
        );
        assert_eq!(schedule.night_sleep, t("18:15"));
        assert!(schedule.night_predicted);
    }

    #[test]
    fn in_progress_nap_keeps_start_and_projects_end() {
        let corrections: CorrectionSet = [Correction::started(1, t("09:10"))].into_iter().collect();
        let schedule = recalculate(t("07:00"), &corrections, &Model::default());

        let first = &schedule.naps[0];
        assert_eq!(first.start, t("09:10"));
        assert_eq!(first.end, t("10:25"));
        assert_eq!(first.duration_minutes, 75);
        assert!(first.predicted);
        assert_eq!(schedule.naps[1].start, t("13:10"));
    }

    #[test]
    fn last_correction_for_a_slot_wins() {
        let corrections: CorrectionSet = [
            Correction::finished(1, t("09:00"), t("09:40")),
            Correction::finished(1, t("09:20"), t("10:20")),
        ]
        .into_iter()
        .collect();
        assert_eq!(corrections.len(), 1);

        let schedule = recalculate(t("07:00"), &corrections, &Model::default());
        assert_eq!(schedule.naps[0].start, t("09:20"));
        assert_eq!(schedule.naps[0].duration_minutes, 60);
    }

    #[test]
    fn out_of_range_corrections_are_ignored() {
        let model = Model::default();
        let corrections: CorrectionSet = [
            Correction::finished(0, t("08:00"), t("09:00")),
            Correction::finished(7, t("08:00"), t("09:00")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            recalculate(t("07:00"), &corrections, &model),
            predict(t("07:00"), &model)
        );
    }

    #[test]
    fn recalculate_without_corrections_matches_predict() {
        let model = Model::default();
        assert_eq!(
            recalculate(t("06:30"), &CorrectionSet::new(), &model),
            predict(t("06:30"), &model)
        );
    }

    #[test]
    fn end_before_start_is_not_validated() {
        let corrections: CorrectionSet =
            [Correction::finished(1, t("10:00"), t("09:30"))].into_iter().collect();
        let schedule = recalculate(t("07:00"), &corrections, &Model::default());
        assert_eq!(schedule.naps[0].duration_minutes, -30);
        assert!(!schedule.naps[0].predicted);
    }

    #[test]
    fn confirm_night_overrides_projection() {
        let mut schedule = predict(t("07:00"), &Model::default());
        schedule.confirm_night(t("19:40"));
        assert_eq!(schedule.night_sleep, t("19:40"));
        assert!(!schedule.night_predicted);
    }

    #[test]
    fn wake_time_prediction_crosses_midnight() {
        let model = Model {
            night_sleep_duration: 630,
            ..Model::default()
        };
        assert_eq!(predict_wake_time(t("19:45"), &model), t("06:15"));
    }

    #[test]
    fn schedule_json_uses_hh_mm_strings() {
        let schedule = predict(t("07:00"), &Model::default());
        let value = serde_json::to_value(&schedule).unwrap();
        assert_eq!(value["wake_time"], "07:00");
        assert_eq!(value["naps"][0]["start"], "09:30");
        assert_eq!(value["naps"][0]["duration_minutes"], 75);
        assert_eq!(value["night_sleep"], "20:45");
        assert_eq!(value["night_predicted"], true);
    }
}
