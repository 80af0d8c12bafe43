//! Preference Log
//!
//! Append-only record of every confirmation answer. Advisory only: policy
//! decisions never read it back.
//!
//! Storage: <log dir>/preferences.jsonl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// One confirmation answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub tool: String,
    pub confirmed: bool,
    pub timestamp: DateTime<Utc>,
}

impl PreferenceRecord {
    pub fn new(tool: &str, confirmed: bool) -> Self {
        Self {
            tool: tool.to_string(),
            confirmed,
            timestamp: Utc::now(),
        }
    }
}

/// Where confirmation answers go. Best-effort: never fails the caller.
pub trait PreferenceSink: Send + Sync {
    fn record(&self, record: &PreferenceRecord);
}

/// JSONL file sink
pub struct PreferenceLog {
    enabled: bool,
    path: PathBuf,
}

impl PreferenceLog {
    pub fn new(enabled: bool, path: impl Into<PathBuf>) -> Self {
        let log = Self {
            enabled,
            path: path.into(),
        };
        info!(
            "PreferenceLog initialised. Enabled={} Path={}",
            log.enabled,
            log.path.display()
        );
        log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &PreferenceRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Read every record back, skipping lines that don't parse
    pub fn read_all(&self) -> std::io::Result<Vec<PreferenceRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl PreferenceSink for PreferenceLog {
    fn record(&self, record: &PreferenceRecord) {
        if !self.enabled {
            return;
        }
        match self.append(record) {
            Ok(()) => info!("Recorded preference: {} confirmed={}", record.tool, record.confirmed),
            Err(e) => warn!("Failed to record preference for {}: {}", record.tool, e),
        }
    }
}

/// Per-tool answer counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPreference {
    pub tool: String,
    pub allowed: usize,
    pub denied: usize,
}

/// Tally answers per tool, sorted by tool name
pub fn summarize(records: &[PreferenceRecord]) -> Vec<ToolPreference> {
    let mut by_tool: BTreeMap<&str, ToolPreference> = BTreeMap::new();
    for record in records {
        let entry = by_tool
            .entry(record.tool.as_str())
            .or_insert_with(|| ToolPreference {
                tool: record.tool.clone(),
                ..Default::default()
            });
        if record.confirmed {
            entry.allowed += 1;
        } else {
            entry.denied += 1;
        }
    }
    by_tool.into_values().collect()
}

/// In-memory sink for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryPreferenceSink {
    records: Mutex<Vec<PreferenceRecord>>,
}

impl MemoryPreferenceSink {
    pub fn records(&self) -> Vec<PreferenceRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PreferenceSink for MemoryPreferenceSink {
    fn record(&self, record: &PreferenceRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}
