pub mod auth;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod records;
pub mod scheduling;
pub mod storage;
pub mod tracker;
pub mod training;

pub use clock::WallTime;
pub use error::SleepError;
pub use model::Model;
pub use records::{DailyRecord, NapEvent, SleepLog};
pub use scheduling::{
    predict, predict_wake_time, recalculate, Correction, CorrectionSet, Schedule,
};
pub use training::train;
