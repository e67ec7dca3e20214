use crate::errors::StoreError;
use crate::migrate::{normalize_days, normalize_settings, normalize_snapshot, parse_raw};
use crate::models::{DayRecord, Settings, TimerSnapshot};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, error};

pub const DAYS_KEY: &str = "daily_logs";
pub const TIMER_KEY: &str = "active_timer";
pub const SETTINGS_KEY: &str = "settings";

/// String-keyed document storage.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Option<Vec<u8>>;
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per document under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                error!("failed to read {}: {err}", path.display());
                None
            }
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a half-written document.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, bytes)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    docs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.docs
            .lock()
            .map(|docs| docs.contains_key(key))
            .unwrap_or(false)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.docs.lock().ok()?.get(key).cloned()
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.docs
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.docs
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

/// Typed access to the three persisted documents.
#[derive(Clone)]
pub struct Repository {
    storage: Arc<dyn Storage>,
}

impl Repository {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn load_days(&self) -> BTreeMap<String, DayRecord> {
        match self.storage.read(DAYS_KEY) {
            Some(bytes) => normalize_days(parse_raw(&bytes)),
            None => BTreeMap::new(),
        }
    }

    /// Always well-formed; an absent day reads as an empty record.
    pub fn load_day(&self, date: &str) -> DayRecord {
        self.load_days().remove(date).unwrap_or_default()
    }

    pub fn save_days(&self, days: &BTreeMap<String, DayRecord>) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(days)?;
        self.storage.write(DAYS_KEY, &payload)
    }

    /// Replaces one day's record wholesale, leaving other days untouched.
    pub fn save_day(&self, date: &str, record: &DayRecord) -> Result<(), StoreError> {
        let mut days = self.load_days();
        days.insert(date.to_string(), record.clone());
        debug!(%date, "persisting day record");
        self.save_days(&days)
    }

    pub fn load_snapshot(&self) -> Option<TimerSnapshot> {
        let bytes = self.storage.read(TIMER_KEY)?;
        normalize_snapshot(parse_raw(&bytes))
    }

    pub fn save_snapshot(&self, snapshot: &TimerSnapshot) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(snapshot)?;
        self.storage.write(TIMER_KEY, &payload)
    }

    pub fn clear_snapshot(&self) -> Result<(), StoreError> {
        self.storage.remove(TIMER_KEY)
    }

    pub fn load_settings(&self) -> Settings {
        match self.storage.read(SETTINGS_KEY) {
            Some(bytes) => normalize_settings(parse_raw(&bytes)),
            None => Settings::default(),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(settings)?;
        self.storage.write(SETTINGS_KEY, &payload)
    }
}
