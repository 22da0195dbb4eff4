use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WAKE_WINDOWS: [i64; 3] = [150, 165, 180];
pub const DEFAULT_NAP_DURATIONS: [i64; 3] = [75, 90, 45];
pub const DEFAULT_NAPS_COUNT: usize = 3;
pub const DEFAULT_NIGHT_WINDOW: i64 = 120;
pub const DEFAULT_NIGHT_DURATION: i64 = 660; // 11 hours

/// Per-slot sleep statistics learned from historical days.
///
/// `wake_windows` and `nap_durations` are indexed by slot and hold
/// `typical_naps_count` entries each. All durations are in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub wake_windows: Vec<i64>,
    pub nap_durations: Vec<i64>,
    pub typical_naps_count: usize,
    pub night_sleep_window: i64,
    #[serde(default = "default_night_duration")]
    pub night_sleep_duration: i64,
    pub trained_on: Option<NaiveDate>,
    #[serde(default)]
    pub days_count: usize,
}

fn default_night_duration() -> i64 {
    DEFAULT_NIGHT_DURATION
}

impl Default for Model {
    /// Baseline infant pattern used until enough history has been recorded.
    fn default() -> Self {
        Self {
            wake_windows: DEFAULT_WAKE_WINDOWS.to_vec(),
            nap_durations: DEFAULT_NAP_DURATIONS.to_vec(),
            typical_naps_count: DEFAULT_NAPS_COUNT,
            night_sleep_window: DEFAULT_NIGHT_WINDOW,
            night_sleep_duration: DEFAULT_NIGHT_DURATION,
            trained_on: None,
            days_count: 0,
        }
    }
}

impl Model {
    pub fn is_trained(&self) -> bool {
        self.trained_on.is_some()
    }

    pub fn is_consistent(&self) -> bool {
        self.wake_windows.len() == self.typical_naps_count
            && self.nap_durations.len() == self.typical_naps_count
    }
}
