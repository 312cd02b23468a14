//! Durable term -> count storage consulted by [`SuggestionTrie`](crate::SuggestionTrie).
//!
//! Reads fail soft: a missing or unreadable store loads as an empty map.
//! Writes always replace the whole persisted map.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub type FrequencyMap = HashMap<String, u64>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write frequency store {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode frequency map: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait FrequencyStore: Send + Sync {
    fn load(&self) -> FrequencyMap;
    fn save(&self, frequencies: &FrequencyMap) -> Result<(), StoreError>;
}

/// A flat JSON object of `{"term": count}` in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl FrequencyStore for JsonFileStore {
    fn load(&self) -> FrequencyMap {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "frequency store not found, starting empty");
                return FrequencyMap::new();
            }
            Err(error) => {
                warn!(path = %self.path.display(), "failed to read frequency store: {error}");
                return FrequencyMap::new();
            }
        };
        if raw.trim().is_empty() {
            return FrequencyMap::new();
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => decode_frequencies(value),
            Err(error) => {
                warn!(path = %self.path.display(), "frequency store is not valid JSON: {error}");
                FrequencyMap::new()
            }
        }
    }

    fn save(&self, frequencies: &FrequencyMap) -> Result<(), StoreError> {
        let ordered: BTreeMap<&str, u64> = frequencies
            .iter()
            .map(|(term, count)| (term.as_str(), *count))
            .collect();
        let payload = serde_json::to_vec(&ordered)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, payload).map_err(|e| self.write_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.write_err(e))
    }
}

fn decode_frequencies(value: Value) -> FrequencyMap {
    let Value::Object(entries) = value else {
        warn!("frequency store is not a JSON object, starting empty");
        return FrequencyMap::new();
    };
    let mut frequencies = FrequencyMap::with_capacity(entries.len());
    for (term, count) in entries {
        match count.as_u64() {
            Some(count) => {
                frequencies.insert(term, count);
            }
            None => warn!(term = %term, value = %count, "skipping malformed frequency entry"),
        }
    }
    frequencies
}

/// Keeps the persisted map in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<FrequencyMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frequencies(frequencies: FrequencyMap) -> Self {
        Self {
            saved: Mutex::new(frequencies),
        }
    }

    pub fn snapshot(&self) -> FrequencyMap {
        self.saved.lock().clone()
    }
}

impl FrequencyStore for MemoryStore {
    fn load(&self) -> FrequencyMap {
        self.snapshot()
    }

    fn save(&self, frequencies: &FrequencyMap) -> Result<(), StoreError> {
        *self.saved.lock() = frequencies.clone();
        Ok(())
    }
}
