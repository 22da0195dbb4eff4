use crate::auth::{ClientSecrets, ClientSecretsFile, StoredToken};
use crate::model::Model;
use crate::records::SleepLog;
use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "sleep_data.json";
pub const MODEL_FILE: &str = "model.json";
pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const TOKEN_FILE: &str = "token.json";

/// Whole-file JSON persistence for the sleep log, the trained model and the calendar
/// OAuth files.
///
/// No locking: concurrent writers race and the last one wins.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// The stored log, or an empty one on first run.
    pub fn load_log(&self) -> Result<SleepLog> {
        Ok(read_json(&self.log_path())?.unwrap_or_default())
    }

    pub fn save_log(&self, log: &SleepLog) -> Result<()> {
        write_json(&self.log_path(), log)
    }

    /// The stored model, or the untrained baseline when none has been saved.
    pub fn load_model(&self) -> Result<Model> {
        let model: Model = read_json(&self.model_path())?.unwrap_or_default();
        if !model.is_consistent() {
            warn!(
                "{} has {} naps but {} wake windows and {} durations; missing slots use fallbacks",
                self.model_path().display(),
                model.typical_naps_count,
                model.wake_windows.len(),
                model.nap_durations.len()
            );
        }
        Ok(model)
    }

    pub fn save_model(&self, model: &Model) -> Result<()> {
        write_json(&self.model_path(), model)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// The OAuth client from `credentials.json`, if one has been saved there.
    pub fn load_client_secrets(&self) -> Result<Option<ClientSecrets>> {
        let path = self.credentials_path();
        match read_json::<ClientSecretsFile>(&path)? {
            Some(file) => file
                .into_secrets()
                .map(Some)
                .ok_or_else(|| anyhow!("{} holds no installed or web client", path.display())),
            None => Ok(None),
        }
    }

    pub fn load_token(&self) -> Result<Option<StoredToken>> {
        read_json(&self.token_path())
    }

    pub fn save_token(&self, token: &StoredToken) -> Result<()> {
        write_json(&self.token_path(), token)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("{} not found, using defaults", path.display());
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}
