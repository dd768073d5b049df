//! High-confluence history
//!
//! The tracker keeps a newest-first log of moments where the confluence
//! score was extreme, and follows the price after each of them until the
//! record locks. Persistence goes through a [`HistoryStore`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::HistoryConfig;
use crate::confluence::Bias;

// ============================================================
// RECORD
// ============================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    /// `HH:MM` of the timestamp
    pub display_time: String,
    pub confluence_score: f64,
    pub bias: Bias,
    /// Price when recorded; 0 if none was known
    pub price: f64,
    pub instrument_id: String,
    /// Percentage move since the record was taken
    pub result: Option<f64>,
    pub result_locked: bool,
}

impl HistoryRecord {
    pub fn new(
        instrument_id: &str,
        confluence_score: f64,
        bias: Bias,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            display_time: timestamp.format("%H:%M").to_string(),
            confluence_score,
            bias,
            price,
            instrument_id: instrument_id.to_string(),
            result: None,
            result_locked: false,
        }
    }
}

// ============================================================
// TRACKER
// ============================================================

/// Owner of the in-memory history log
#[derive(Debug, Clone)]
pub struct HistoryTracker {
    config: HistoryConfig,
    /// Newest first
    records: Vec<HistoryRecord>,
    /// Bumped on every change to the log
    revision: u64,
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl HistoryTracker {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            revision: 0,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Changes whenever a record is added, updated or replaced
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Full log, newest first
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn records_for<'a>(&'a self, instrument: &'a str) -> impl Iterator<Item = &'a HistoryRecord> {
        self.records.iter().filter(move |r| r.instrument_id == instrument)
    }

    pub fn latest_for(&self, instrument: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.instrument_id == instrument)
    }

    /// Scores at either extreme qualify for recording
    pub fn is_extreme(&self, score: f64) -> bool {
        score >= self.config.high_threshold || score <= self.config.low_threshold
    }

    /// One evaluation step: back-fill outcomes, then admit a new record if
    /// the score is extreme and the instrument's latest record is old enough.
    ///
    /// Returns the admitted record.
    pub fn track(
        &mut self,
        instrument: &str,
        score: f64,
        bias: Bias,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<&HistoryRecord> {
        self.backfill(instrument, price, now);

        if !self.is_extreme(score) {
            return None;
        }
        let spacing = Duration::seconds(self.config.min_spacing_secs);
        if let Some(latest) = self.latest_for(instrument) {
            if now - latest.timestamp < spacing {
                debug!(instrument, score, "history admission throttled");
                return None;
            }
        }

        let record = HistoryRecord::new(instrument, score, bias, price, now);
        info!(instrument, score, %bias, price, "high confluence recorded");
        self.records.insert(0, record);
        self.records.truncate(self.config.max_records);
        self.revision += 1;
        self.records.first()
    }

    /// Recompute the outcome of every unlocked record of `instrument`.
    ///
    /// Records with no captured price are skipped, as is everything while
    /// no current price is known. A record locks on the update at or after
    /// the lock age, keeping that final result. Returns the number updated.
    pub fn backfill(&mut self, instrument: &str, price: f64, now: DateTime<Utc>) -> usize {
        if price.is_nan() || price <= 0.0 {
            return 0;
        }
        let lock_after = Duration::seconds(self.config.lock_after_secs);
        let mut updated = 0;
        for rec in self
            .records
            .iter_mut()
            .filter(|r| r.instrument_id == instrument && r.price != 0.0 && !r.result_locked)
        {
            rec.result = Some((price - rec.price) / rec.price * 100.0);
            if now - rec.timestamp >= lock_after {
                rec.result_locked = true;
            }
            updated += 1;
        }
        if updated > 0 {
            self.revision += 1;
        }
        updated
    }

    /// Replace the instrument's records with `loaded`, placed ahead of
    /// every other instrument's records, then cap the log.
    ///
    /// An empty `loaded` (nothing stored, or a failed load) keeps the
    /// in-memory records untouched.
    pub fn merge_loaded(&mut self, instrument: &str, loaded: Vec<HistoryRecord>) {
        let mut merged: Vec<HistoryRecord> = loaded
            .into_iter()
            .filter(|r| r.instrument_id == instrument)
            .collect();
        if merged.is_empty() {
            return;
        }
        merged.extend(self.records.drain(..).filter(|r| r.instrument_id != instrument));
        merged.truncate(self.config.max_records);
        self.records = merged;
        self.revision += 1;
    }

    /// The most recent records of one instrument, as stored
    pub fn persisted_view(&self, instrument: &str) -> Vec<HistoryRecord> {
        self.records_for(instrument)
            .take(self.config.persisted_per_instrument)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.revision += 1;
    }
}

// ============================================================
// STORES
// ============================================================

/// History persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("History I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("History encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-instrument persistence of the history view
pub trait HistoryStore: Send + Sync {
    /// Stored records, newest first. Empty when nothing was saved.
    fn load(&self, instrument: &str) -> Result<Vec<HistoryRecord>, StoreError>;

    fn save(&self, instrument: &str, records: &[HistoryRecord]) -> Result<(), StoreError>;
}

/// One JSON file per instrument inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File of one instrument. The id is hex-encoded so distinct ids never
    /// share a file.
    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("history_{}.json", hex::encode(instrument)))
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self, instrument: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        let path = self.path_for(instrument);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, instrument: &str, records: &[HistoryRecord]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(records)?;
        fs::write(self.path_for(instrument), content)?;
        Ok(())
    }
}

/// Process-local store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Vec<HistoryRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self, instrument: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(instrument).cloned().unwrap_or_default())
    }

    fn save(&self, instrument: &str, records: &[HistoryRecord]) -> Result<(), StoreError> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(instrument.to_string(), records.to_vec());
        Ok(())
    }
}
