use crate::clock::WallTime;
use crate::error::SleepError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// A nap given on the command line as `HH:MM-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NapSpan {
    pub start: WallTime,
    pub end: WallTime,
}

impl FromStr for NapSpan {
    type Err = SleepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| SleepError::InvalidTime(s.to_string()))?;
        Ok(NapSpan {
            start: start.parse()?,
            end: end.parse()?,
        })
    }
}

/// Predict and track a baby's naps and night sleep
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding sleep_data.json and model.json (defaults to ~/.baby-sleep)
    #[arg(long, global = true, env = "BABY_SLEEP_HOME")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the model on historical sleep data
    Train,

    /// Predict today's sleep schedule from the morning wake time
    Predict {
        /// Morning wake time in HH:MM format (e.g. 07:15)
        wake_time: String,
    },

    /// Correct the actual time of a nap or of night sleep
    ///
    /// Examples:
    ///   baby-sleep correct 1 09:30 10:45    # nap 1 finished
    ///   baby-sleep correct 2 13:10          # nap 2 in progress
    ///   baby-sleep correct night 19:30      # night sleep
    #[command(verbatim_doc_comment)]
    Correct {
        /// Nap number (1, 2, 3) or 'night'
        target: String,
        /// Actual start time (HH:MM)
        start: String,
        /// Actual end time (HH:MM), naps only
        end: Option<String>,
    },

    /// Add or replace a historical day
    Add {
        /// Date in YYYY-MM-DD format (e.g. 2025-01-15)
        date: String,
        /// Morning wake time (HH:MM)
        #[arg(long)]
        wake: String,
        /// A nap as HH:MM-HH:MM, repeat for each nap in order
        #[arg(long = "nap")]
        naps: Vec<String>,
        /// Night sleep time (HH:MM)
        #[arg(long)]
        night: String,
        /// Feed time (HH:MM), repeatable
        #[arg(long = "feed")]
        feeds: Vec<String>,
    },

    /// Show today's schedule with predictions and corrections
    Show,

    /// Show recent completed days
    History {
        /// Number of days to show
        #[arg(default_value = "7")]
        days: usize,
        /// Also export every completed day to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Mirror a day's schedule into Google Calendar
    Sync {
        /// Day to sync in YYYY-MM-DD format, defaults to today
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        calendar: CalendarArgs,
    },

    /// List calendars available to the authorized account
    Calendars {
        #[command(flatten)]
        calendar: CalendarArgs,
    },

    /// Authorize calendar access once through the browser
    ///
    /// Needs a Desktop OAuth client for the Google Calendar API saved as
    /// credentials.json in the data directory. The resulting token.json is
    /// refreshed automatically by sync and calendars.
    #[command(verbatim_doc_comment)]
    Authorize,
}

#[derive(clap::Args, Debug)]
pub struct CalendarArgs {
    /// Target calendar id
    #[arg(long, env = "BABY_SLEEP_CALENDAR_ID", default_value = "primary")]
    pub calendar_id: String,

    /// OAuth access token to use instead of the stored token.json
    #[arg(long, env = "BABY_SLEEP_CALENDAR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl Args {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".baby-sleep")
        })
    }
}
