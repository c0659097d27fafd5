//! Durable dedup state: last-seen odds, alert cooldown timestamps and
//! resolved-market flags.
//!
//! Reads are served from an in-memory mirror loaded at startup. Every write
//! rewrites the whole document to a temporary file and renames it over the
//! original, so a crash mid-write leaves the previous version intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AlertType, OddsSnapshot};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state file I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state document is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// On-disk shape of the state file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    /// market id -> last observed odds
    #[serde(default)]
    pub odds: BTreeMap<String, OddsSnapshot>,
    /// subject key -> alert type -> epoch millis
    #[serde(default)]
    pub last_alerted: BTreeMap<String, BTreeMap<String, i64>>,
    /// market id -> resolved alert already sent
    #[serde(default)]
    pub resolved: BTreeMap<String, bool>,
}

pub struct StateStore {
    path: PathBuf,
    doc: StateDocument,
    healthy: Arc<AtomicBool>,
}

impl StateStore {
    /// Load the state file, or start empty if it does not exist yet.
    /// A file that exists but cannot be parsed is an error, never a reset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let doc = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateDocument::default(),
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };

        tracing::info!(
            path = %path.display(),
            odds = doc.odds.len(),
            subjects = doc.last_alerted.len(),
            resolved = doc.resolved.len(),
            "State store loaded"
        );

        Ok(Self {
            path,
            doc,
            healthy: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Shared flag: `false` while the most recent write failed.
    pub fn health_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.healthy)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn odds(&self, market_id: u64) -> Option<OddsSnapshot> {
        self.doc.odds.get(&market_id.to_string()).copied()
    }

    pub fn set_odds(&mut self, market_id: u64, snapshot: OddsSnapshot) -> Result<(), PersistenceError> {
        self.doc.odds.insert(market_id.to_string(), snapshot);
        self.persist()
    }

    /// Epoch millis of the last alert, `0` if never alerted.
    pub fn last_alerted(&self, subject_key: &str, alert_type: AlertType) -> i64 {
        self.doc
            .last_alerted
            .get(subject_key)
            .and_then(|by_type| by_type.get(alert_type.as_str()))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_last_alerted(
        &mut self,
        subject_key: &str,
        alert_type: AlertType,
        epoch_ms: i64,
    ) -> Result<(), PersistenceError> {
        self.doc
            .last_alerted
            .entry(subject_key.to_string())
            .or_default()
            .insert(alert_type.as_str().to_string(), epoch_ms);
        self.persist()
    }

    pub fn is_resolved(&self, market_id: u64) -> bool {
        self.doc
            .resolved
            .get(&market_id.to_string())
            .copied()
            .unwrap_or(false)
    }

    pub fn set_resolved(&mut self, market_id: u64) -> Result<(), PersistenceError> {
        self.doc.resolved.insert(market_id.to_string(), true);
        self.persist()
    }

    /// Write the mirror to disk. The mirror keeps the new value even when the
    /// write fails, so this process does not re-alert; the failure is surfaced
    /// through the health flag instead.
    fn persist(&mut self) -> Result<(), PersistenceError> {
        match write_atomic(&self.path, &self.doc) {
            Ok(()) => {
                self.healthy.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.healthy.store(false, Ordering::Relaxed);
                metrics::counter!("state_persist_failures_total").increment(1);
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "STATE PERSISTENCE FAILED: alerts may repeat after restart"
                );
                Err(e)
            }
        }
    }
}

fn write_atomic(path: &Path, doc: &StateDocument) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(doc)?;
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err)
}
