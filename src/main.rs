use anyhow::{Context, Result};
use baby_sleep::auth;
use baby_sleep::calendar::{self, CalendarService, GoogleCalendar};
use baby_sleep::clock::{parse_date, WallTime};
use baby_sleep::config::{Args, CalendarArgs, Command, NapSpan};
use baby_sleep::output;
use baby_sleep::records::{DailyRecord, NapEvent};
use baby_sleep::storage::Store;
use baby_sleep::tracker::{self, CorrectionTarget};
use baby_sleep::training;
use chrono::{Local, NaiveDate, Utc};
use clap::Parser;
use log::debug;
use reqwest::blocking::Client;

fn train(store: &Store, today: NaiveDate) -> Result<()> {
    let log = store.load_log()?;
    let historical = log.historical_days(today, true);
    if historical.is_empty() {
        println!("No historical data found. Using default patterns.");
    }

    let model = training::train(historical, today);
    store.save_model(&model)?;

    println!("Model trained on {} days of data.", model.days_count);
    print!("{}", output::render_model(&model));
    Ok(())
}

fn predict(store: &Store, today: NaiveDate, wake_time: &str) -> Result<()> {
    let wake: WallTime = wake_time.parse()?;

    let model = store.load_model()?;
    if !model.is_trained() {
        println!("No trained model found. Using default patterns.");
        println!("Run 'baby-sleep train' after adding historical data for better predictions.");
    }

    let mut log = store.load_log()?;
    let schedule = tracker::start_day(&mut log, today, wake, &model);
    store.save_log(&log)?;

    if let Some((bedtime, slept)) = tracker::last_night(&log, today, wake) {
        println!(
            "Last night: asleep at {}, {} of night sleep.",
            bedtime,
            output::format_duration(slept)
        );
    }

    print!("{}", output::render_schedule(&schedule, "Predicted Schedule for Today"));
    Ok(())
}

fn correct(
    store: &Store,
    today: NaiveDate,
    target: &str,
    start: &str,
    end: Option<&str>,
) -> Result<()> {
    let start: WallTime = start.parse()?;
    let target: CorrectionTarget = target.parse()?;
    let mut log = store.load_log()?;

    match target {
        CorrectionTarget::Night => {
            let schedule = tracker::correct_night(&mut log, today, start)?;
            store.save_log(&log)?;
            println!("Night sleep updated: {}", start);
            if let Some(schedule) = schedule {
                print!("{}", output::render_schedule(&schedule, "Updated Schedule"));
            }
        }
        CorrectionTarget::Nap(number) => {
            let end = end.map(str::parse::<WallTime>).transpose()?;
            let model = store.load_model()?;
            let schedule = tracker::correct_nap(&mut log, today, &model, number, start, end)?;
            store.save_log(&log)?;
            match end {
                Some(end) => println!("Nap {} updated: {}-{}", number, start, end),
                None => println!("Nap {} started: {}", number, start),
            }
            print!("{}", output::render_schedule(&schedule, "Updated Schedule"));
        }
    }
    Ok(())
}

fn add(
    store: &Store,
    date: &str,
    wake: &str,
    naps: &[String],
    night: &str,
    feeds: &[String],
) -> Result<()> {
    let date = parse_date(date)?;
    let mut record = DailyRecord::empty(date);
    record.morning_wake = Some(wake.parse()?);
    record.naps = naps
        .iter()
        .map(|n| n.parse::<NapSpan>().map(|span| NapEvent::actual(span.start, span.end)))
        .collect::<Result<_, _>>()?;
    record.night_sleep = Some(night.parse()?);
    record.night_predicted = Some(false);
    record.feeds = feeds
        .iter()
        .map(|f| f.parse::<WallTime>())
        .collect::<Result<_, _>>()?;

    let mut log = store.load_log()?;
    log.upsert_day(record);
    store.save_log(&log)?;

    println!("Added sleep data for {}", date);
    Ok(())
}

fn show(store: &Store, today: NaiveDate) -> Result<()> {
    let log = store.load_log()?;
    let day = log.day(today).filter(|d| d.morning_wake.is_some());
    match day.and_then(|d| d.predictions.as_ref().map(|s| (d, s))) {
        Some((day, schedule)) => {
            let title = format!("Schedule for {}", day.date);
            print!("{}", output::render_schedule(schedule, &title));
        }
        None if day.is_some() => println!("No predictions available."),
        None => {
            println!("No prediction for today.");
            println!("Run 'baby-sleep predict <wake_time>' to get started.");
        }
    }
    Ok(())
}

fn history(
    store: &Store,
    today: NaiveDate,
    days: usize,
    csv: Option<&std::path::Path>,
) -> Result<()> {
    let log = store.load_log()?;
    let historical = log.historical_days(today, false);
    if historical.is_empty() {
        println!("No historical data found.");
        println!("Use 'baby-sleep add <date>' to add historical data.");
        return Ok(());
    }

    print!("{}", output::render_history(&historical, days));
    if let Some(path) = csv {
        output::write_history_csv(path, &historical)
            .with_context(|| format!("Failed to export history to {}", path.display()))?;
        println!("Wrote {} days to {}", historical.len(), path.display());
    }
    Ok(())
}

fn sync(
    store: &Store,
    today: NaiveDate,
    date: Option<&str>,
    service: &mut dyn CalendarService,
    calendar_id: &str,
) -> Result<()> {
    let date = date.map(parse_date).transpose()?.unwrap_or(today);
    let model = store.load_model()?;
    let mut log = store.load_log()?;

    let Some(day) = log.day_mut(date) else {
        println!("No sleep data for {}.", date);
        return Ok(());
    };

    let time_zone = calendar::local_timezone();
    debug!("Syncing {} to calendar {} in {}", date, calendar_id, time_zone);
    let event_ids = calendar::sync_day(service, calendar_id, day, &model, &time_zone)?;
    let synced = event_ids.len();
    day.calendar_event_ids = event_ids;
    store.save_log(&log)?;

    println!("Synced {} events for {} to calendar '{}'.", synced, date, calendar_id);
    Ok(())
}

/// A calendar client authorized by `--token` or, failing that, the stored OAuth token.
fn connect(store: &Store, calendar: &CalendarArgs) -> Result<GoogleCalendar> {
    let token = match &calendar.token {
        Some(token) => token.clone(),
        None => auth::access_token(store, &Client::new(), Utc::now())?,
    };
    GoogleCalendar::new(token)
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();
    let store = Store::new(args.data_dir());
    let today = Local::now().date_naive();
    debug!("Using data directory {}", store.dir().display());

    match &args.command {
        Command::Train => train(&store, today),
        Command::Predict { wake_time } => predict(&store, today, wake_time),
        Command::Correct { target, start, end } => {
            correct(&store, today, target, start, end.as_deref())
        }
        Command::Add {
            date,
            wake,
            naps,
            night,
            feeds,
        } => add(&store, date, wake, naps, night, feeds),
        Command::Show => show(&store, today),
        Command::History { days, csv } => history(&store, today, *days, csv.as_deref()),
        Command::Sync { date, calendar } => {
            let mut google = connect(&store, calendar)?;
            sync(&store, today, date.as_deref(), &mut google, &calendar.calendar_id)
        }
        Command::Calendars { calendar } => {
            let mut google = connect(&store, calendar)?;
            for cal in google.list_calendars()? {
                println!("{}  {}", cal.id, cal.name);
            }
            Ok(())
        }
        Command::Authorize => {
            auth::authorize(&store, &Client::new(), Utc::now())?;
            println!("Calendar access authorized.");
            println!("Run 'baby-sleep sync' to mirror today's schedule.");
            Ok(())
        }
    }
}
