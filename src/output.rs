use crate::clock::WallTime;
use crate::model::Model;
use crate::records::DailyRecord;
use crate::scheduling::Schedule;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

/// Minutes as `2h 15m`, `2h` or `45m`.
pub fn format_duration(minutes: i64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 && mins > 0 {
        format!("{}h {}m", hours, mins)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", mins)
    }
}

fn status(predicted: bool) -> &'static str {
    if predicted {
        "Predicted"
    } else {
        "Actual"
    }
}

fn or_dash(time: Option<WallTime>) -> String {
    time.map(|t| t.to_string()).unwrap_or_else(|| "-".into())
}

pub fn render_schedule(schedule: &Schedule, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", title);
    let _ = writeln!(
        out,
        "{:<8} {:^7} {:^7} {:^9} {:^10}",
        "Event", "Start", "End", "Duration", "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(45));
    let _ = writeln!(
        out,
        "{:<8} {:^7} {:^7} {:^9} {:^10}",
        "Wake",
        schedule.wake_time.to_string(),
        "-",
        "-",
        "Actual"
    );
    for (i, nap) in schedule.naps.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<8} {:^7} {:^7} {:^9} {:^10}",
            format!("Nap {}", i + 1),
            nap.start.to_string(),
            nap.end.to_string(),
            format_duration(nap.duration_minutes),
            status(nap.predicted)
        );
    }
    let _ = writeln!(
        out,
        "{:<8} {:^7} {:^7} {:^9} {:^10}",
        "Night",
        schedule.night_sleep.to_string(),
        "-",
        "-",
        status(schedule.night_predicted)
    );
    out
}

fn naps_summary(day: &DailyRecord) -> String {
    if day.naps.is_empty() {
        return "-".into();
    }
    day.naps
        .iter()
        .map(|n| format!("{}-{}", n.start, n.end))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The most recent `limit` days, newest first.
pub fn recent_days<'a>(days: &[&'a DailyRecord], limit: usize) -> Vec<&'a DailyRecord> {
    let mut recent = days.to_vec();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.truncate(limit);
    recent
}

pub fn render_history(days: &[&DailyRecord], limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nSleep History");
    let _ = writeln!(out, "{:<10}  {:^5}  {:^6}  {}", "Date", "Wake", "Night", "Naps");
    let _ = writeln!(out, "{}", "-".repeat(48));
    for day in recent_days(days, limit) {
        let _ = writeln!(
            out,
            "{:<10}  {:^5}  {:^6}  {}",
            day.date.to_string(),
            or_dash(day.morning_wake),
            or_dash(day.night_sleep),
            naps_summary(day)
        );
    }
    out
}

fn minutes_list(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| format!("{}min", v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_model(model: &Model) -> String {
    let trained_on = model
        .trained_on
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Never".into());
    let mut out = String::new();
    let _ = writeln!(out, "\nModel Information");
    let _ = writeln!(out, "Trained on: {}", trained_on);
    let _ = writeln!(out, "Training days: {}", model.days_count);
    let _ = writeln!(out, "Typical naps: {}\n", model.typical_naps_count);
    let _ = writeln!(out, "Wake Windows: {}", minutes_list(&model.wake_windows));
    let _ = writeln!(out, "Nap Durations: {}", minutes_list(&model.nap_durations));
    let _ = writeln!(out, "Night Window: {}min", model.night_sleep_window);
    let _ = writeln!(
        out,
        "Night Duration: {}",
        format_duration(model.night_sleep_duration)
    );
    out
}

/// Write one row per day, oldest first.
pub fn write_history_csv(path: &Path, days: &[&DailyRecord]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["date", "morning_wake", "naps", "night_sleep"])?;

    let mut ordered = days.to_vec();
    ordered.sort_by_key(|d| d.date);
    for day in ordered {
        let naps = day
            .naps
            .iter()
            .map(|n| format!("{}-{}", n.start, n.end))
            .collect::<Vec<_>>()
            .join(" ");
        writer.write_record([
            day.date.to_string(),
            day.morning_wake.map(|t| t.to_string()).unwrap_or_default(),
            naps,
            day.night_sleep.map(|t| t.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::NapEvent;
    use crate::scheduling::predict;
    use chrono::NaiveDate;

    fn t(s: &str) -> WallTime {
        s.parse().unwrap()
    }

    fn day(d: &str, night: Option<&str>) -> DailyRecord {
        DailyRecord {
            morning_wake: Some(t("07:00")),
            naps: vec![
                NapEvent::actual(t("09:30"), t("10:45")),
                NapEvent::actual(t("13:30"), t("15:00")),
            ],
            night_sleep: night.map(t),
            ..DailyRecord::empty(d.parse::<NaiveDate>().unwrap())
        }
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(135), "2h 15m");
        assert_eq!(format_duration(120), "2h");
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(0), "0m");
    }

    #[test]
    fn schedule_table_lists_every_event() {
        let mut schedule = predict(t("07:00"), &Model::default());
        schedule.confirm_night(t("20:00"));
        let text = render_schedule(&schedule, "Updated Schedule");
        assert!(text.contains("Updated Schedule"));
        assert!(text.contains("Nap 3"));
        assert!(text.contains("1h 15m"));
        let night_line = text.lines().find(|l| l.starts_with("Night")).unwrap();
        assert!(night_line.contains("20:00"));
        assert!(night_line.contains("Actual"));
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let a = day("2025-01-01", Some("19:30"));
        let b = day("2025-01-02", None);
        let c = day("2025-01-03", Some("20:00"));
        let days = vec![&a, &b, &c];

        let recent: Vec<_> = recent_days(&days, 2).iter().map(|d| d.date.to_string()).collect();
        assert_eq!(recent, vec!["2025-01-03", "2025-01-02"]);

        let text = render_history(&days, 2);
        assert!(!text.contains("2025-01-01"));
        assert!(text.contains("09:30-10:45, 13:30-15:00"));
    }

    #[test]
    fn model_panel_shows_statistics() {
        let text = render_model(&Model::default());
        assert!(text.contains("Trained on: Never"));
        assert!(text.contains("Wake Windows: 150min, 165min, 180min"));
        assert!(text.contains("Night Duration: 11h"));
    }

    #[test]
    fn history_csv_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("export").join("history.csv");
        let a = day("2025-01-02", None);
        let b = day("2025-01-01", Some("19:30"));

        write_history_csv(&path, &[&a, &b]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines[0], "date,morning_wake,naps,night_sleep");
        assert_eq!(lines[1], "2025-01-01,07:00,09:30-10:45 13:30-15:00,19:30");
        assert_eq!(lines[2], "2025-01-02,07:00,09:30-10:45 13:30-15:00,");
    }
}
