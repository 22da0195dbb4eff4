use crate::clock::WallTime;
use crate::model::Model;
use crate::records::{DailyRecord, NapEvent};
use crate::scheduling::predict_wake_time;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDateTime};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

// Calendar palette ids: 5 = banana (yellow), 9 = blueberry (blue)
pub const COLOR_NAP: &str = "5";
pub const COLOR_NIGHT: &str = "9";

pub const NIGHT_KEY: &str = "night";

/// A calendar entry derived from one slot of a day's schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEvent {
    pub key: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color_id: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

/// Request body for creating or replacing a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub color_id: String,
}

impl EventBody {
    pub fn new(event: &PlannedEvent, time_zone: &str) -> Self {
        let at = |t: NaiveDateTime| EventTime {
            date_time: t.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: time_zone.to_string(),
        };
        Self {
            summary: event.title.clone(),
            description: event.description.clone(),
            start: at(event.start),
            end: at(event.end),
            color_id: event.color_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSummary {
    pub id: String,
    pub name: String,
}

/// The external calendar the schedule is mirrored into.
pub trait CalendarService {
    /// Create an event and return its id.
    fn insert_event(&mut self, calendar_id: &str, event: &EventBody) -> Result<String>;

    /// Replace an existing event. `Ok(false)` means the event no longer exists upstream.
    fn update_event(&mut self, calendar_id: &str, event_id: &str, event: &EventBody)
        -> Result<bool>;

    fn list_calendars(&mut self) -> Result<Vec<CalendarSummary>>;
}

/// The first moment at or after `earliest` whose clock reads `time`.
fn next_at(earliest: NaiveDateTime, time: WallTime) -> NaiveDateTime {
    let at = earliest.date().and_time(time.as_naive());
    if at < earliest {
        at + Duration::days(1)
    } else {
        at
    }
}

fn nap_event(day_start: NaiveDateTime, number: usize, nap: &NapEvent) -> PlannedEvent {
    let start = next_at(day_start, nap.start);
    let end = next_at(start, nap.end);
    let status = if nap.predicted { "Predicted" } else { "Actual" };
    PlannedEvent {
        key: format!("nap_{}", number),
        title: format!("Baby Nap {}", number),
        start,
        end,
        color_id: COLOR_NAP,
        description: format!(
            "Duration: {} minutes\nStatus: {}",
            nap.duration_minutes, status
        ),
    }
}

/// The events to mirror for one day: one per nap slot plus the night sleep.
///
/// Stored predictions take precedence over the raw record. Times earlier on the clock
/// than the morning wake belong to the following date.
pub fn plan_day_events(day: &DailyRecord, model: &Model) -> Vec<PlannedEvent> {
    let schedule = day.predictions.as_ref();
    let wake = schedule.map(|s| s.wake_time).or(day.morning_wake);
    let day_start = day
        .date
        .and_time(wake.map(|w| w.as_naive()).unwrap_or_default());
    let naps = match schedule {
        Some(s) if !s.naps.is_empty() => &s.naps,
        _ => &day.naps,
    };

    let mut events: Vec<PlannedEvent> = naps
        .iter()
        .enumerate()
        .map(|(i, nap)| nap_event(day_start, i + 1, nap))
        .collect();

    let night = schedule.map(|s| s.night_sleep).or(day.night_sleep);
    if let Some(night) = night {
        let predicted = schedule
            .map(|s| s.night_predicted)
            .or(day.night_predicted)
            .unwrap_or(true);
        let duration = model.night_sleep_duration;
        let start = next_at(day_start, night);
        events.push(PlannedEvent {
            key: NIGHT_KEY.to_string(),
            title: "Baby Night Sleep".to_string(),
            start,
            end: start + Duration::minutes(duration),
            color_id: COLOR_NIGHT,
            description: format!(
                "Duration: {}h {}m\nStatus: {}\nPredicted wake: {}",
                duration / 60,
                duration % 60,
                if predicted { "Predicted" } else { "Actual" },
                predict_wake_time(night, model)
            ),
        });
    }

    events
}

fn create<S: CalendarService + ?Sized>(
    service: &mut S,
    calendar_id: &str,
    key: &str,
    body: &EventBody,
) -> Option<String> {
    match service.insert_event(calendar_id, body) {
        Ok(id) => {
            debug!("Created {} as {}", key, id);
            Some(id)
        }
        Err(e) => {
            warn!("Failed to create calendar event {}: {:#}", key, e);
            None
        }
    }
}

/// Mirror a day's schedule into the calendar, upserting by the ids stored on the day.
///
/// Returns the slot key to event id map to store back on the record. Slots whose event
/// could not be created are left out.
pub fn sync_day<S: CalendarService + ?Sized>(
    service: &mut S,
    calendar_id: &str,
    day: &DailyRecord,
    model: &Model,
    time_zone: &str,
) -> Result<BTreeMap<String, String>> {
    let mut event_ids = BTreeMap::new();

    for event in plan_day_events(day, model) {
        let body = EventBody::new(&event, time_zone);
        let id = match day.calendar_event_ids.get(&event.key) {
            Some(existing) => {
                if service.update_event(calendar_id, existing, &body)? {
                    debug!("Updated {} ({})", event.key, existing);
                    Some(existing.clone())
                } else {
                    info!("{} was deleted upstream, creating a new event", event.key);
                    create(service, calendar_id, &event.key, &body)
                }
            }
            None => create(service, calendar_id, &event.key, &body),
        };
        if let Some(id) = id {
            event_ids.insert(event.key, id);
        }
    }

    Ok(event_ids)
}

/// IANA zone name from a `TZ` value, which may carry a leading `:`.
fn zone_from_tz_var(value: &str) -> Option<String> {
    let zone = value.strip_prefix(':').unwrap_or(value).trim();
    (!zone.is_empty()).then(|| zone.to_string())
}

/// Best-effort local timezone name for event times, `UTC` when unknown.
pub fn local_timezone() -> String {
    if let Some(zone) = std::env::var("TZ").ok().as_deref().and_then(zone_from_tz_var) {
        return zone;
    }
    if let Ok(target) = fs::read_link("/etc/localtime") {
        if let Some((_, zone)) = target.to_string_lossy().split_once("zoneinfo/") {
            return zone.to_string();
        }
    }
    if let Ok(contents) = fs::read_to_string("/etc/timezone") {
        let zone = contents.trim();
        if !zone.is_empty() {
            return zone.to_string();
        }
    }
    "UTC".to_string()
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CalendarListEntry {
    id: String,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarList {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

/// Google Calendar v3 over REST, authorized with an OAuth access token.
pub struct GoogleCalendar {
    client: Client,
    token: String,
    base: Url,
}

impl GoogleCalendar {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: impl Into<String>, base: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            token: token.into(),
            base: Url::parse(base).with_context(|| format!("Invalid calendar API url {}", base))?,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Calendar API url {} cannot take a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl CalendarService for GoogleCalendar {
    fn insert_event(&mut self, calendar_id: &str, event: &EventBody) -> Result<String> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let created: CreatedEvent = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(event)
            .send()
            .context("Failed to reach calendar API")?
            .error_for_status()?
            .json()
            .context("Unexpected response creating event")?;
        Ok(created.id)
    }

    fn update_event(
        &mut self,
        calendar_id: &str,
        event_id: &str,
        event: &EventBody,
    ) -> Result<bool> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(event)
            .send()
            .context("Failed to reach calendar API")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(true)
    }

    fn list_calendars(&mut self) -> Result<Vec<CalendarSummary>> {
        let url = self.url(&["users", "me", "calendarList"])?;
        let list: CalendarList = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .context("Failed to reach calendar API")?
            .error_for_status()?
            .json()
            .context("Unexpected response listing calendars")?;
        Ok(list
            .items
            .into_iter()
            .map(|entry| CalendarSummary {
                name: entry.summary.unwrap_or_else(|| entry.id.clone()),
                id: entry.id,
            })
            .collect())
    }
}
